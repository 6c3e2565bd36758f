//! Consilium - AI Multi-Specialist Medical Report Analyzer
//!
//! A CLI tool that dispatches a medical report to several AI specialists
//! concurrently and combines their findings into one multidisciplinary
//! assessment.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, config, connection failure, etc.)
//!   2 - Partial failure (one or more specialists produced no result)

mod agent;
mod cli;
mod config;
mod input;
mod models;
mod orchestrator;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::ProgressBar;
use models::{AnalysisInput, ProgressEvent, RunMetadata, RunOutcome};
use orchestrator::{run_analysis, NullReporter, ProgressReporter};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
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

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Consilium v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the consultation
    match run_consultation(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .consilium.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".consilium.toml");

    if path.exists() {
        eprintln!("⚠️  .consilium.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .consilium.toml")?;

    println!("✅ Created .consilium.toml with default settings.");
    println!("   Edit it to customize model, specialists, and report layout.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Progress reporter driving an indicatif bar scaled to 0-100.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Self {
        Self {
            bar: ProgressBar::new(100),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for BarReporter {
    fn report(&mut self, event: ProgressEvent) {
        self.bar.set_position((event.fraction * 100.0).round() as u64);
        self.bar.set_message(event.label);
    }
}

/// Run the complete consultation workflow. Returns exit code (0 or 2).
async fn run_consultation(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Load the report
    let report_path = args.report_path().to_path_buf();
    println!("📄 Loading report: {}", report_path.display());
    let report_text = input::load_report(&report_path)?;
    info!(
        "Report loaded: {} chars from {}",
        report_text.len(),
        report_path.display()
    );

    // Handle --dry-run: preview the report and exit
    if args.dry_run {
        return handle_dry_run(&report_text);
    }

    // Step 2: Build the specialist roster
    let specialties = config.enabled_specialties()?;

    println!("🩺 Initializing AI specialists...");
    println!("   Model: {}", config.model.name);
    println!("   Timeout: {}s", config.model.timeout_seconds);
    println!(
        "   Specialists: {}",
        specialties
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let api_key = args.api_key.clone().unwrap_or_default();
    let specs = agent::specialist_specs(&config.model, &specialties);
    let synthesis = agent::team_factory(&config.model, &api_key);
    let analysis_input = AnalysisInput::new(report_text.clone(), api_key);

    // Step 3: Run the concurrent consultation
    println!("\n🔬 Running specialist consultations...\n");

    let mut bar_reporter = BarReporter::new();
    let mut null_reporter = NullReporter;
    let reporter: &mut dyn ProgressReporter = if args.quiet {
        &mut null_reporter
    } else {
        &mut bar_reporter
    };

    let outcome = run_analysis(analysis_input, specs, synthesis, reporter).await?;
    bar_reporter.finish();

    let duration = start_time.elapsed().as_secs_f64();

    let review = match outcome {
        RunOutcome::Success(review) => review,
        RunOutcome::PartialFailure(reason) => {
            warn!("Run ended without a final assessment: {}", reason);
            eprintln!("\n⚠️  Analysis incomplete: {}", reason);
            eprintln!("   No report was generated. Check the API key and quota, then retry.");
            return Ok(2);
        }
    };

    // Step 4: Render and save the report
    println!("\n📝 Generating report...");

    let metadata = RunMetadata {
        generated_at: Utc::now(),
        model: config.model.name.clone(),
        report_bytes: report_text.len(),
        duration_seconds: duration,
    };

    let output = match args.format {
        OutputFormat::Text => report::generate_text_report(&review, &metadata, &config.report),
        OutputFormat::Markdown => {
            report::generate_markdown_report(&review, &metadata, &config.report)
        }
        OutputFormat::Json => report::generate_json_report(&review, &metadata)?,
    };

    let output_path = PathBuf::from(&config.general.output);
    report::save_report(&output, &output_path)?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!("   Specialists consulted: {}", review.reports.len());
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    Ok(0)
}

/// Handle --dry-run: preview the report, no API calls.
fn handle_dry_run(report_text: &str) -> Result<i32> {
    println!("\n🔍 Dry run: previewing report (no API calls)...\n");
    println!(
        "   {} chars, {} lines\n",
        report_text.len(),
        report_text.lines().count()
    );
    println!("{}", input::preview(report_text, 10));
    println!("\n✅ Dry run complete. No API calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .consilium.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
