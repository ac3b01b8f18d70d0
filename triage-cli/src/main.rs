// Triage CLI - root cause analysis of application logs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use triage_core::{
    read_tail_lines, AnalysisOrchestrator, AnalysisOutcome, AppConfig, DefaultRenderer, Metrics,
    OutputKind, RenderedReport, ReportStore, SqliteReportStore,
};
use triage_web::WebConfig;

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq)]
enum Format {
    Json,
    Html,
    Docx,
}

impl From<Format> for OutputKind {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => OutputKind::Json,
            Format::Html => OutputKind::Html,
            Format::Docx => OutputKind::Document,
        }
    }
}

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Cluster application logs and rank probable root causes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the tail of a log file
    Analyze {
        /// Log file to read
        file: PathBuf,

        /// Number of trailing lines to analyze
        #[arg(long, default_value = "200")]
        lines: usize,

        /// Metrics as a JSON object, e.g. '{"latency": 1500}'
        #[arg(long)]
        metrics: Option<String>,

        #[arg(long, value_enum, default_value = "json")]
        format: Format,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Do not record the report in the local database
        #[arg(long)]
        no_store: bool,

        /// Document converter used for docx output
        #[arg(long, env = "TRIAGE_PANDOC", default_value = "pandoc")]
        pandoc: PathBuf,
    },

    /// Start the HTTP server
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show recently stored reports
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr so reports on stdout stay clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("triage_core=info".parse()?)
                .add_directive("triage_web=info".parse()?),
        )
        .init();

    match cli.command {
        Commands::Analyze {
            file,
            lines,
            metrics,
            format,
            output,
            no_store,
            pandoc,
        } => {
            let metrics = parse_metrics(metrics.as_deref(), &file)?;
            analyze(&file, lines, metrics, format, output, no_store, pandoc).await
        }
        Commands::Serve { port } => {
            let mut config = WebConfig::load()?;
            if let Some(port) = port {
                config.port = port;
            }
            info!("Starting web server on port {}", config.port);
            triage_web::serve(config).await
        }
        Commands::History { limit } => history(limit).await,
    }
}

fn parse_metrics(raw: Option<&str>, file: &Path) -> Result<Metrics> {
    match raw {
        Some(json) => serde_json::from_str(json).context("--metrics must be a JSON object"),
        None => Ok(Metrics::new().with("source", file.display().to_string())),
    }
}

async fn open_store() -> Result<SqliteReportStore> {
    let path = triage_core::db_path::get_database_path();
    SqliteReportStore::open(&path)
        .await
        .with_context(|| format!("Failed to open report database at {}", path.display()))
}

async fn analyze(
    file: &Path,
    lines: usize,
    metrics: Metrics,
    format: Format,
    output: Option<PathBuf>,
    no_store: bool,
    pandoc: PathBuf,
) -> Result<()> {
    let config = AppConfig::from_env()?;
    let log_lines = read_tail_lines(file, lines)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    info!("Read {} lines from {}", log_lines.len(), file.display());

    let mut orchestrator = AnalysisOrchestrator::from_config(&config)
        .with_renderer(Arc::new(DefaultRenderer::new(pandoc)));
    if !no_store {
        match open_store().await {
            Ok(store) => orchestrator = orchestrator.with_store(Arc::new(store)),
            Err(e) => warn!("Reports will not be stored: {:#}", e),
        }
    }

    let rendered = orchestrator
        .run_rendered(&log_lines, &metrics, format.into())
        .await?;

    if let AnalysisOutcome::Failed { message, error } = &rendered.outcome {
        anyhow::bail!("{} {}", message, error);
    }

    match rendered.report {
        RenderedReport::Inline { body, .. } => match output {
            Some(path) => {
                std::fs::write(&path, body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Report written to {}", path.display());
            }
            None => println!("{}", body),
        },
        RenderedReport::Document { file_name, bytes } => {
            let path = output.unwrap_or_else(|| PathBuf::from(file_name));
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Document written to {}", path.display());
        }
    }

    Ok(())
}

async fn history(limit: usize) -> Result<()> {
    let store = open_store().await?;
    let reports = store.recent(limit).await?;

    if reports.is_empty() {
        println!("No reports stored yet.");
        return Ok(());
    }

    for report in reports {
        println!(
            "#{:<5} {}  [{:>5.1}%]  {}",
            report.id,
            report.record.created_at.format("%Y-%m-%d %H:%M:%S"),
            report.record.confidence * 100.0,
            report.record.cause
        );
        if !report.record.next_steps.is_empty() {
            println!("        -> {}", report.record.next_steps);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use triage_core::output::DOCUMENT_FILE_NAME;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_arguments() {
        let cli = Cli::try_parse_from([
            "triage",
            "analyze",
            "app.log",
            "--lines",
            "50",
            "--format",
            "docx",
            "--metrics",
            r#"{"latency": 1500}"#,
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                file,
                lines,
                format,
                metrics,
                output,
                ..
            } => {
                assert_eq!(file, PathBuf::from("app.log"));
                assert_eq!(lines, 50);
                assert_eq!(format, Format::Docx);
                assert_eq!(OutputKind::from(format), OutputKind::Document);
                assert!(output.is_none());
                let metrics = parse_metrics(metrics.as_deref(), &file).unwrap();
                assert_eq!(metrics.get_f64("latency"), Some(1500.0));
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_default_metrics_name_the_source() {
        let metrics = parse_metrics(None, Path::new("/var/log/app.log")).unwrap();
        assert_eq!(
            metrics.get("source").and_then(|v| v.as_str()),
            Some("/var/log/app.log")
        );
        assert!(parse_metrics(Some("[1, 2]"), Path::new("x")).is_err());
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(DOCUMENT_FILE_NAME, "Root_Cause_Analysis.docx");
    }
}
