//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{ArgGroup, Parser, Subcommand};
use iqreport::models::Stage;
use std::path::PathBuf;

/// iqreport - evaluation reports from a Nexus IQ style policy server
///
/// List report summaries, fetch full reports, aggregate them across an
/// organization and see which violations were fixed or waived between
/// two evaluations of the same application.
///
/// Examples:
///   iqreport infos --app webgoat
///   iqreport report --app webgoat --stage build
///   iqreport reports --org Engineering --format json
///   iqreport diff --app webgoat 2c5b0e9a 9f1d77e4
///   iqreport --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Base URL of the server
    #[arg(long, global = true, value_name = "URL", env = "IQ_URL")]
    pub url: Option<String>,

    /// User for basic authentication
    #[arg(short, long, global = true, env = "IQ_USERNAME")]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(short, long, global = true, env = "IQ_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .iqreport.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the result to this file instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Give up on the whole command after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Number of concurrent report retrievals during aggregations
    #[arg(long, global = true, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .iqreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List report summaries
    #[command(group(ArgGroup::new("scope").required(true).args(["app", "all", "org"])))]
    Infos {
        /// Application public ID
        #[arg(long, value_name = "ID")]
        app: Option<String>,

        /// Every application on the instance
        #[arg(long)]
        all: bool,

        /// Every application of this organization
        #[arg(long, value_name = "NAME")]
        org: Option<String>,
    },

    /// Fetch one full report (policy verdicts plus raw inventory)
    #[command(group(ArgGroup::new("which").required(true).args(["stage", "report_id"])))]
    Report {
        /// Application public ID
        #[arg(long, value_name = "ID")]
        app: String,

        /// Latest report at this stage
        #[arg(long, value_parser = parse_stage)]
        stage: Option<Stage>,

        /// Report with this identifier
        #[arg(long, value_name = "ID")]
        report_id: Option<String>,
    },

    /// Fetch reports in bulk
    #[command(group(ArgGroup::new("scope").required(true).args(["all", "org"])))]
    Reports {
        /// Every report summary on the instance
        #[arg(long)]
        all: bool,

        /// Late-stage reports of every application in this organization
        #[arg(long, value_name = "NAME")]
        org: Option<String>,
    },

    /// Show which violations were fixed or waived between two reports
    Diff {
        /// Application public ID
        #[arg(long, value_name = "ID")]
        app: String,

        /// First report ID
        report1: String,

        /// Second report ID
        report2: String,
    },

    /// Component details across late-stage reports
    Components {
        /// Limit to one application; every application when absent
        #[arg(long, value_name = "ID")]
        app: Option<String>,
    },
}

impl Command {
    /// Whether the command fans out over many applications or reports.
    pub fn is_aggregation(&self) -> bool {
        match self {
            Command::Infos { app, .. } => app.is_none(),
            Command::Reports { .. } => true,
            Command::Components { .. } => true,
            Command::Report { .. } | Command::Diff { .. } => false,
        }
    }
}

fn parse_stage(s: &str) -> Result<Stage, String> {
    s.parse()
}

/// Output format for the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A subcommand is required (try --help)".to_string());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Server URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(Command::Diff {
            ref report1,
            ref report2,
            ..
        }) = self.command
        {
            if report1 == report2 {
                return Err("Diff needs two different report IDs".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
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
