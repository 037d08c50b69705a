//! BrandPulse - share-of-voice tracking for brands in LLM answers
//!
//! A CLI tool that sends prompts to a language model, scores how
//! prominently each tracked brand appears in the answers, and reports
//! a leaderboard and a trend across runs.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (invalid arguments, config, database, provider, etc.)

mod analysis;
mod cli;
mod config;
mod llm;
mod models;
mod report;
mod results;
mod runner;
mod store;

use anyhow::{bail, Context, Result};
use cli::{Args, Command, OutputFormat, ReportArgs, RunArgs};
use config::{Config, CONFIG_FILE_NAME};
use models::CallStatus;
use runner::{RunOptions, RunRequest};
use std::path::{Path, PathBuf};
use std::time::Instant;
use store::Store;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    let (mut config, config_path) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("BrandPulse v{}", env!("CARGO_PKG_VERSION"));
    match config_path {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args.command);

    if let Err(e) = dispatch(&args, &config).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .brandpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to choose the provider, model, database, and run defaults.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from an explicit path, the default location, or defaults.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(CONFIG_FILE_NAME)))),
        None => Ok((Config::default(), None)),
    }
}

fn open_store(config: &Config) -> Result<Store> {
    let path = &config.general.database;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Store::open(path)
}

async fn dispatch(args: &Args, config: &Config) -> Result<()> {
    match args.command {
        Command::Run(ref run) => handle_run(run, config, args.quiet).await,
        Command::Results(ref report) => handle_results(report, config),
        Command::Trend(ref report) => handle_trend(report, config),
        Command::Clear(_) => handle_clear(config),
        Command::InitConfig => handle_init_config(),
    }
}

/// Execute a run and print a summary of its calls.
async fn handle_run(run_args: &RunArgs, config: &Config, quiet: bool) -> Result<()> {
    let start_time = Instant::now();

    let request = RunRequest {
        brands: run_args.brand_list(),
        primary_brand: run_args.primary_brand(),
        prompts: run_args.prompt_list()?,
        runs_per_prompt: config.run.runs_per_prompt,
    };
    request.validate()?;

    let store = open_store(config)?;
    let client = llm::create_client(&config.model)?;

    let total_calls = request.prompts.len() * request.runs_per_prompt as usize;
    println!("🚀 Starting run...");
    println!(
        "   Provider: {} ({})",
        client.provider_name(),
        client.model_name()
    );
    println!("   Brands: {}", request.brands.join(", "));
    println!(
        "   Prompts: {} × {} run(s) = {} call(s)",
        request.prompts.len(),
        request.runs_per_prompt,
        total_calls
    );
    println!("   Database: {}\n", config.general.database.display());

    let options = RunOptions {
        concurrency: config.run.concurrency,
        show_progress: !run_args.no_progress && !quiet,
    };
    let summary = runner::execute_run(&store, client.as_ref(), &request, &options).await?;

    for outcome in &summary.outcomes {
        if let CallStatus::Error { ref message } = outcome.status {
            println!(
                "   ⚠️  \"{}\" run {}: {}",
                outcome.prompt, outcome.run_number, message
            );
        }
    }

    println!("\n📊 Run Summary:");
    println!("   Run ID: {}", summary.run_id);
    println!("   Succeeded: {}", summary.succeeded());
    println!("   Failed: {}", summary.failed());
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    if summary.succeeded() == 0 {
        bail!("All {} call(s) failed", summary.outcomes.len());
    }

    println!("\n✅ Run complete! See the results with `brandpulse results`.");
    Ok(())
}

fn handle_results(report_args: &ReportArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let results = results::get_results(&store)?;

    let output = match report_args.format {
        OutputFormat::Json => report::generate_json_report(&results)?,
        OutputFormat::Markdown => report::generate_results_markdown(&results, &config.report),
    };
    emit(&output, report_args.output.as_deref())
}

fn handle_trend(report_args: &ReportArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let trend = results::get_trend(&store)?;

    let output = match report_args.format {
        OutputFormat::Json => report::generate_json_report(&trend)?,
        OutputFormat::Markdown => report::generate_trend_markdown(&trend),
    };
    emit(&output, report_args.output.as_deref())
}

fn handle_clear(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.clear_all()?;

    println!(
        "🧹 Cleared {} run(s), {} response(s), {} analysis row(s).",
        stats.runs, stats.responses, stats.analysis
    );
    Ok(())
}

/// Print a rendered report, or save it when an output path is given.
fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            report::write_report(content, path)?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
