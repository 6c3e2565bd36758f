//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Consilium - AI multi-specialist medical report analyzer
///
/// Dispatch a medical report to several AI specialists concurrently and
/// combine their findings into a multidisciplinary assessment.
///
/// Examples:
///   consilium report.txt
///   consilium report.txt --format markdown --output review.md
///   consilium report.txt --model gemini-1.5-pro --temperature 0.4
///   consilium report.txt --dry-run
///   consilium --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the medical report (.txt)
    ///
    /// PDF extraction is not supported; convert the report to plain text
    /// first. Not required when using --init-config.
    #[arg(value_name = "REPORT", required_unless_present = "init_config")]
    pub report: Option<PathBuf>,

    /// Gemini API key
    ///
    /// Can also be set via the GEMINI_API_KEY environment variable.
    /// Not needed for --dry-run.
    #[arg(short = 'k', long, env = "GEMINI_API_KEY", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Gemini model to use for all consultations
    ///
    /// Defaults to gemini-1.5-flash (or the config file setting).
    #[arg(short, long, env = "CONSILIUM_MODEL", value_name = "NAME")]
    pub model: Option<String>,

    /// Gemini API base URL
    ///
    /// Defaults to the public Gemini endpoint (or the config file setting).
    #[arg(long, env = "GEMINI_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Output file path for the rendered report
    ///
    /// Defaults to medical_analysis.txt (or the config file setting).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (text, markdown, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Temperature for LLM responses (0.0 - 1.0)
    ///
    /// Defaults to 0.2 (or the config file setting).
    #[arg(long, value_name = "TEMP")]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .consilium.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load and preview the report without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .consilium.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text format (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the report path, falling back to an empty path (validated first).
    pub fn report_path(&self) -> &Path {
        self.report.as_deref().unwrap_or(Path::new(""))
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let report = self.report.as_deref().unwrap_or(Path::new(""));

        if !report.exists() {
            return Err(format!("Report file does not exist: {}", report.display()));
        }
        if !report.is_file() {
            return Err(format!("Report path is not a file: {}", report.display()));
        }
        if report
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
        {
            return Err(
                "PDF reports are not supported; extract the text to a .txt file first".to_string(),
            );
        }

        // The API key is only needed when workers actually run
        if !self.dry_run {
            match self.api_key.as_deref() {
                Some(key) if !key.trim().is_empty() => {}
                _ => {
                    return Err(
                        "Gemini API key required: pass --api-key or set GEMINI_API_KEY"
                            .to_string(),
                    )
                }
            }

            if let Some(ref api_url) = self.api_url {
                if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                    return Err("API URL must start with 'http://' or 'https://'".to_string());
                }
            }
        }

        // Validate temperature range if provided
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
