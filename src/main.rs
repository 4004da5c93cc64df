//! iqreport - evaluation reports from a Nexus IQ style policy server
//!
//! A CLI that lists report summaries, fetches full reports, aggregates them
//! across applications and organizations, and diffs two reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, missing report, etc.)
//!   2 - An aggregation finished but some sources could not be retrieved

mod cli;
mod config;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use iqreport::analysis::ItemFailure;
use iqreport::models::ReportInfo;
use iqreport::{report, Aggregator, Cancel, HttpSettings, HttpTransport, IqClient, Partial};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
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

    info!("iqreport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .iqreport.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the server URL, credentials and concurrency.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so that stdout carries only the rendered result.
fn init_logging(args: &Args) {
    let level = args.log_level();

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

/// Rendered command output plus the number of sources that failed.
struct Rendered {
    text: String,
    failures: usize,
}

impl Rendered {
    fn complete(text: String) -> Self {
        Self { text, failures: 0 }
    }
}

/// Run one command end to end. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let Some(command) = args.command.clone() else {
        anyhow::bail!("A subcommand is required (try --help)");
    };

    info!("Server: {}", config.server.url);
    let transport = HttpTransport::new(HttpSettings {
        base_url: config.server.url.clone(),
        username: config.server.username.clone(),
        password: config.server.password.clone(),
        timeout_seconds: config.client.timeout_seconds,
    })?;
    let aggregator = Aggregator::new(
        IqClient::new(Arc::new(transport)),
        config.client.concurrency,
    );

    let cancel = if config.client.deadline_seconds > 0 {
        Cancel::with_timeout(Duration::from_secs(config.client.deadline_seconds))
    } else {
        Cancel::new()
    };
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding requests");
            on_interrupt.cancel();
        }
    });

    let spinner = if command.is_aggregation() && !args.quiet {
        Some(make_spinner())
    } else {
        None
    };

    let result = run_command(&aggregator, &cancel, &command, config.output_format()).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let rendered = result?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &rendered.text)
                .with_context(|| format!("Failed to write result to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Result saved to: {}", path.display());
            }
        }
        None => println!("{}", rendered.text),
    }

    info!("Done in {:.1}s", start_time.elapsed().as_secs_f64());

    if rendered.failures > 0 {
        eprintln!(
            "\n⛔ {} source(s) could not be retrieved. Result is incomplete (exit code 2).",
            rendered.failures
        );
        return Ok(2);
    }

    Ok(0)
}

async fn run_command(
    aggregator: &Aggregator,
    cancel: &Cancel,
    command: &Command,
    format: OutputFormat,
) -> Result<Rendered> {
    let client = aggregator.client();

    match command {
        Command::Infos { app: Some(app), .. } => {
            let infos = client.list_report_infos_for_application(cancel, app).await?;
            render_infos(format, &infos, &[]).map(Rendered::complete)
        }
        Command::Infos { all: true, .. } => {
            let infos = aggregator.all_report_infos(cancel).await?;
            render_infos(format, &infos, &[]).map(Rendered::complete)
        }
        Command::Infos { org, .. } => {
            let org = org.as_deref().unwrap_or_default();
            let partial = aggregator.report_infos_for_organization(cancel, org).await?;
            let text = render_infos(format, &partial.items, &partial.failures)?;
            Ok(Rendered {
                text,
                failures: partial.failures.len(),
            })
        }
        Command::Report {
            app,
            stage,
            report_id,
        } => {
            let report = match (stage, report_id) {
                (_, Some(id)) => client.fetch_report_by_report_id(cancel, app, id).await?,
                (Some(stage), None) => client.fetch_report(cancel, app, *stage).await?,
                (None, None) => anyhow::bail!("Either --stage or --report-id is required"),
            };
            let text = match format {
                OutputFormat::Json => report::generate_json(&report)?,
                OutputFormat::Markdown => report::generate_report_markdown(&report),
            };
            Ok(Rendered::complete(text))
        }
        Command::Reports { org, .. } => {
            let partial = match org {
                Some(org) => aggregator.reports_for_organization(cancel, org).await?,
                None => aggregator.all_reports(cancel).await?,
            };
            render_partial(format, partial, report::generate_reports_markdown)
        }
        Command::Diff {
            app,
            report1,
            report2,
        } => {
            let diff = client.diff_reports(cancel, app, report1, report2).await?;
            info!(
                "{} fixed, {} waived between {} and {}",
                diff.fixed.len(),
                diff.waived.len(),
                diff.earlier().info().report_id(),
                diff.later().info().report_id()
            );
            let text = match format {
                OutputFormat::Json => report::generate_json(&diff)?,
                OutputFormat::Markdown => report::generate_diff_markdown(&diff),
            };
            Ok(Rendered::complete(text))
        }
        Command::Components { app } => {
            let partial = match app {
                Some(app) => aggregator.components_for_application(cancel, app).await?,
                None => aggregator.all_components(cancel).await?,
            };
            render_partial(format, partial, report::generate_components_markdown)
        }
    }
}

fn render_infos(
    format: OutputFormat,
    infos: &[ReportInfo],
    failures: &[ItemFailure],
) -> Result<String> {
    Ok(match format {
        OutputFormat::Json if failures.is_empty() => report::generate_json(infos)?,
        OutputFormat::Json => report::generate_json(&PartialOutput::new(infos, failures))?,
        OutputFormat::Markdown => report::generate_infos_markdown(infos, failures),
    })
}

fn render_partial<T: Serialize>(
    format: OutputFormat,
    partial: Partial<T>,
    markdown: fn(&[T], &[ItemFailure]) -> String,
) -> Result<Rendered> {
    let text = match format {
        OutputFormat::Json => {
            report::generate_json(&PartialOutput::new(&partial.items, &partial.failures))?
        }
        OutputFormat::Markdown => markdown(&partial.items, &partial.failures),
    };
    Ok(Rendered {
        text,
        failures: partial.failures.len(),
    })
}

/// JSON shape of an aggregation result.
#[derive(Serialize)]
struct PartialOutput<'a, T> {
    items: &'a [T],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<String>,
}

impl<'a, T> PartialOutput<'a, T> {
    fn new(items: &'a [T], failures: &[ItemFailure]) -> Self {
        Self {
            items,
            failures: failures.iter().map(ToString::to_string).collect(),
        }
    }
}

fn make_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message("Collecting reports...");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_from_dir(std::path::Path::new(".")) {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
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
