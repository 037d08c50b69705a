//! Run execution: prompt fan-out, storage, and per-response analysis.

use crate::analysis::analyze_response;
use crate::llm::LlmClient;
use crate::models::{
    AnalysisRecord, CallOutcome, CallStatus, ResponseRecord, Run, RunBrand, RunPrompt, RunSummary,
};
use crate::store::Store;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, error, info};

/// Input to a run, as given by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub brands: Vec<String>,
    /// Brand whose visibility is tracked. Matched against `brands` after trimming.
    pub primary_brand: Option<String>,
    pub prompts: Vec<String>,
    pub runs_per_prompt: u32,
}

/// Reasons a run request is rejected before any call is made.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunError {
    #[error("At least one brand is required")]
    NoBrands,

    #[error("At least one prompt is required")]
    NoPrompts,

    #[error("Brand names must not be empty")]
    EmptyBrand,

    #[error("Prompts must not be empty")]
    EmptyPrompt,

    #[error("Brand '{0}' is listed more than once")]
    DuplicateBrand(String),

    #[error("runs_per_prompt must be at least 1")]
    ZeroRuns,
}

impl RunRequest {
    /// Check the request's preconditions.
    ///
    /// Brand names must be unique ignoring case and surrounding whitespace,
    /// since the analyzer matches them case-insensitively.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.brands.is_empty() {
            return Err(RunError::NoBrands);
        }
        if self.prompts.is_empty() {
            return Err(RunError::NoPrompts);
        }
        if self.runs_per_prompt == 0 {
            return Err(RunError::ZeroRuns);
        }

        let mut seen = HashSet::new();
        for brand in &self.brands {
            let key = brand.trim().to_lowercase();
            if key.is_empty() {
                return Err(RunError::EmptyBrand);
            }
            if !seen.insert(key) {
                return Err(RunError::DuplicateBrand(brand.trim().to_string()));
            }
        }

        if self.prompts.iter().any(|p| p.trim().is_empty()) {
            return Err(RunError::EmptyPrompt);
        }

        Ok(())
    }

    fn trimmed_brands(&self) -> Vec<String> {
        self.brands.iter().map(|b| b.trim().to_string()).collect()
    }

    fn trimmed_prompts(&self) -> Vec<String> {
        self.prompts.iter().map(|p| p.trim().to_string()).collect()
    }
}

/// Execution knobs that do not affect results.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of generation calls in flight.
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            show_progress: false,
        }
    }
}

struct Job {
    prompt: String,
    run_number: u32,
}

/// Execute a run end to end.
///
/// A failed generation is recorded as an error outcome and the run moves on.
/// A failed write aborts the run, leaving what was already stored in place.
pub async fn execute_run(
    store: &Store,
    client: &dyn LlmClient,
    request: &RunRequest,
    options: &RunOptions,
) -> Result<RunSummary> {
    request.validate()?;

    let brands = request.trimmed_brands();
    let prompts = request.trimmed_prompts();
    let primary = request
        .primary_brand
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    let run = Run::new(request.runs_per_prompt);
    let run_brands: Vec<RunBrand> = brands
        .iter()
        .map(|brand| RunBrand {
            run_id: run.id.clone(),
            brand: brand.clone(),
            is_primary: !primary.is_empty() && brand == primary,
        })
        .collect();
    let run_prompts: Vec<RunPrompt> = prompts
        .iter()
        .enumerate()
        .map(|(index, text)| RunPrompt {
            run_id: run.id.clone(),
            prompt_index: index as u32,
            prompt_text: text.clone(),
        })
        .collect();

    store.insert_run(&run, &run_brands, &run_prompts)?;

    let jobs: Vec<Job> = prompts
        .iter()
        .flat_map(|prompt| {
            (1..=request.runs_per_prompt).map(move |run_number| Job {
                prompt: prompt.clone(),
                run_number,
            })
        })
        .collect();

    info!(
        "Run {}: {} prompt(s), {} run(s) each, {} call(s) via {} ({})",
        run.id,
        prompts.len(),
        request.runs_per_prompt,
        jobs.len(),
        client.provider_name(),
        client.model_name()
    );

    let progress = progress_bar(jobs.len() as u64, options.show_progress);
    let concurrency = options.concurrency.max(1);

    let mut answers = stream::iter(jobs)
        .map(|job| async move {
            let result = client.generate(&job.prompt).await;
            (job, result)
        })
        .buffered(concurrency);

    let mut outcomes = Vec::new();
    while let Some((job, result)) = answers.next().await {
        progress.set_message(excerpt(&job.prompt));

        let status = match result {
            Ok(text) => {
                let response = ResponseRecord::new(
                    Some(run.id.clone()),
                    job.prompt.as_str(),
                    text,
                    job.run_number,
                    client.provider_name(),
                );
                let analysis: Vec<AnalysisRecord> =
                    analyze_response(&response.response_text, &brands, primary)
                        .iter()
                        .map(|item| AnalysisRecord::from_item(&response.id, item))
                        .collect();

                store.insert_response(&response, &analysis)?;
                debug!(
                    "Stored response {} ({} analysis rows)",
                    response.id,
                    analysis.len()
                );
                CallStatus::Success
            }
            Err(e) => {
                error!(
                    "Prompt \"{}\" run {}/{} failed: {}",
                    excerpt(&job.prompt),
                    job.run_number,
                    request.runs_per_prompt,
                    e
                );
                CallStatus::Error {
                    message: e.to_string(),
                }
            }
        };

        progress.inc(1);
        outcomes.push(CallOutcome {
            prompt: job.prompt,
            run_number: job.run_number,
            status,
        });
    }

    progress.finish_and_clear();

    let summary = RunSummary {
        run_id: run.id,
        outcomes,
    };
    info!(
        "Run completed: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    Ok(summary)
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// First 30 characters of a prompt, for log lines.
fn excerpt(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(30).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
