//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and the splitting of raw brand/prompt input.

use crate::config::Provider;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BrandPulse - share-of-voice tracking for brands in LLM answers
///
/// Sends a set of prompts to a language model, scores how prominently each
/// brand is mentioned in every answer, and reports a leaderboard and a
/// trend across runs.
///
/// Examples:
///   brandpulse run --primary "Zoho CRM" --competitors "HubSpot, Pipedrive" --prompt "Best CRM for startups"
///   brandpulse run --primary Acme --prompts-file prompts.txt --runs-per-prompt 3 --provider ollama
///   brandpulse results --format json --output results.json
///   brandpulse trend
///   brandpulse clear --yes
///   brandpulse init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .brandpulse.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true, env = "BRANDPULSE_DB", value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Model to generate answers with (defaults to the provider's model)
    #[arg(short, long, global = true, env = "BRANDPULSE_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, global = true, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Gemini API key
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send the prompts to the model and score every answer
    Run(RunArgs),
    /// Show the leaderboard and prompt breakdown of the latest run
    Results(ReportArgs),
    /// Show the primary brand's share of voice across runs
    Trend(ReportArgs),
    /// Delete all runs, responses and analysis
    Clear(ClearArgs),
    /// Generate a default .brandpulse.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Brand whose visibility is tracked
    #[arg(short, long, value_name = "BRAND")]
    pub primary: Option<String>,

    /// Competitor brands (comma-separated)
    ///
    /// Example: --competitors "HubSpot, Freshsales, Pipedrive"
    #[arg(long, value_name = "BRANDS")]
    pub competitors: Option<String>,

    /// Prompt to send (repeatable)
    #[arg(long = "prompt", value_name = "TEXT")]
    pub prompts: Vec<String>,

    /// File with one prompt per line
    #[arg(long, value_name = "FILE")]
    pub prompts_file: Option<PathBuf>,

    /// How many times each prompt is sent
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub runs_per_prompt: Option<u32>,

    /// Generation backend
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<Provider>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra attempts after a transient provider failure
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Maximum LLM calls in flight
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Include the raw response log (results only)
    #[arg(long)]
    pub raw: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ClearArgs {
    /// Confirm deletion of all stored data
    #[arg(long)]
    pub yes: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        match &self.command {
            Command::Run(run) => run.validate(),
            Command::Clear(clear) if !clear.yes => {
                Err("Refusing to delete all data without --yes".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl RunArgs {
    fn validate(&self) -> Result<(), String> {
        if self.primary.is_none() && self.competitors.is_none() {
            return Err("Provide at least one brand with --primary or --competitors".to_string());
        }

        if self.prompts.is_empty() && self.prompts_file.is_none() {
            return Err("Provide at least one --prompt or a --prompts-file".to_string());
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.runs_per_prompt == Some(0) {
            return Err("Runs per prompt must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref path) = self.prompts_file {
            if !path.is_file() {
                return Err(format!("Prompts file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Trimmed primary brand, kept whole even if it contains commas.
    pub fn primary_brand(&self) -> Option<String> {
        self.primary
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
    }

    /// Primary brand followed by the split competitor list, blanks removed.
    pub fn brand_list(&self) -> Vec<String> {
        let mut brands: Vec<String> = self.primary_brand().into_iter().collect();
        if let Some(ref competitors) = self.competitors {
            brands.extend(split_brand_list(competitors));
        }
        brands
    }

    /// Prompts given with --prompt followed by those in --prompts-file.
    pub fn prompt_list(&self) -> Result<Vec<String>> {
        let mut prompts: Vec<String> = self
            .prompts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();

        if let Some(ref path) = self.prompts_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompts file: {}", path.display()))?;
            prompts.extend(split_prompt_list(&content));
        }

        Ok(prompts)
    }
}

/// Split comma-separated brand input into trimmed, non-empty names.
pub fn split_brand_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from)
        .collect()
}

/// Split newline-separated prompt input into trimmed, non-empty prompts.
pub fn split_prompt_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
