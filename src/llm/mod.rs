//! Prompt execution against a text-generation backend.
//!
//! The engine only needs "prompt in, answer text out"; this module provides
//! that through the [`LlmClient`] trait with Ollama and Gemini backends.
//! Model settings are passed in explicitly through [`ModelConfig`].

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use crate::config::{ModelConfig, Provider};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

/// Instruction prepended to every prompt.
pub const SYSTEM_PREAMBLE: &str =
    "Provide a structured, neutral, factual answer. No markdown formatting.";

/// First retry delay in milliseconds; later delays grow exponentially.
const RETRY_BASE_MS: u64 = 10;
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// Abstraction over text-generation providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Answer a single prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Tag stored with every response.
    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// Prompt execution errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {0}. Is the server running?")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key (set GEMINI_API_KEY or model.api_key)")]
    MissingApiKey,

    #[error("All {attempts} attempts failed, last error: {last}")]
    RetryExhausted {
        attempts: usize,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Whether trying the same request again might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::Connect(_) | ProviderError::Http(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Classify a failed send into a timeout, connection, or generic error.
    ///
    /// The request URL is stripped from generic errors; messages end up in
    /// logs and stored run outcomes.
    pub(crate) fn from_send(e: reqwest::Error, timeout_seconds: u64, endpoint: &str) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(timeout_seconds)
        } else if e.is_connect() {
            ProviderError::Connect(endpoint.to_string())
        } else {
            ProviderError::Http(e.without_url())
        }
    }
}

/// Build the client selected by `config.provider`.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>, ProviderError> {
    match config.provider {
        Provider::Gemini => Ok(Box::new(GeminiClient::new(config)?)),
        Provider::Ollama => Ok(Box::new(OllamaClient::new(config)?)),
    }
}

/// Run `attempt`, retrying transient failures up to `retries` more times.
pub(crate) async fn with_retry<F, Fut>(retries: usize, attempt: F) -> Result<String, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ProviderError>>,
{
    let strategy = ExponentialBackoff::from_millis(RETRY_BASE_MS)
        .max_delay(RETRY_MAX_DELAY)
        .map(jitter)
        .take(retries);

    RetryIf::spawn(strategy, attempt, |e: &ProviderError| {
        let transient = e.is_transient();
        if transient {
            warn!("Transient provider error, retrying: {}", e);
        }
        transient
    })
    .await
    .map_err(|e| {
        if retries > 0 && e.is_transient() {
            ProviderError::RetryExhausted {
                attempts: retries + 1,
                last: Box::new(e),
            }
        } else {
            e
        }
    })
}
