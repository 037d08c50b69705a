//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.brandpulse.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".brandpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Run defaults.
    #[serde(default)]
    pub run: RunConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path of the SQLite database.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            verbose: false,
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("brandpulse.db")
}

/// Which text-generation backend answers the prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini API (needs an API key)
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

impl Provider {
    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::Ollama => "llama3.2:latest",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

/// LLM model settings, passed explicitly to the prompt executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Generation backend.
    #[serde(default)]
    pub provider: Provider,

    /// Model name. Falls back to the provider's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Gemini API base URL.
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,

    /// Gemini API key. Usually supplied through `GEMINI_API_KEY` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Extra attempts after a transient failure.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            name: None,
            ollama_url: default_ollama_url(),
            gemini_url: default_gemini_url(),
            api_key: None,
            temperature: 0.0,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

impl ModelConfig {
    /// Configured model name, or the provider default.
    pub fn model_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> usize {
    2
}

/// Defaults for executing a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// How many times each prompt is sent.
    #[serde(default = "default_runs_per_prompt")]
    pub runs_per_prompt: u32,

    /// Maximum LLM calls in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            runs_per_prompt: default_runs_per_prompt(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_runs_per_prompt() -> u32 {
    1
}

fn default_concurrency() -> usize {
    1
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the raw response log in Markdown reports.
    #[serde(default)]
    pub include_raw_responses: bool,

    /// Maximum characters of each raw response shown.
    #[serde(default = "default_excerpt_chars")]
    pub max_excerpt_chars: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_raw_responses: false,
            max_excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_excerpt_chars() -> usize {
    280
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref db) = args.db {
            self.general.database = db.clone();
        }
        if args.verbose {
            self.general.verbose = true;
        }
        if let Some(ref key) = args.api_key {
            self.model.api_key = Some(key.clone());
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(ref model) = args.model {
            self.model.name = Some(model.clone());
        }

        if let crate::cli::Command::Run(ref run) = args.command {
            if let Some(provider) = run.provider {
                self.model.provider = provider;
            }
            if let Some(temperature) = run.temperature {
                self.model.temperature = temperature;
            }
            if let Some(timeout) = run.timeout {
                self.model.timeout_seconds = timeout;
            }
            if let Some(retries) = run.retries {
                self.model.retries = retries;
            }
            if let Some(runs) = run.runs_per_prompt {
                self.run.runs_per_prompt = runs;
            }
            if let Some(concurrency) = run.concurrency {
                self.run.concurrency = concurrency;
            }
        }

        if let crate::cli::Command::Results(ref report) = args.command {
            if report.raw {
                self.report.include_raw_responses = true;
            }
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
