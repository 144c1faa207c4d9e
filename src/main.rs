use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use locport::{execute_run, plan_tasks, OutputCollector, RunConfig, ToolSpec};

/// Import app localizations in parallel with the
/// `xcodebuild -importLocalizations` tool
#[derive(Parser)]
#[command(name = "locport")]
#[command(version, about, long_about = None)]
struct Cli {
    /// XLIFF files to import (colon-separated in the env fallback)
    #[arg(
        value_name = "XLIFF",
        env = "LOCPORT_SOURCE_PATHS",
        value_delimiter = ':',
        required = true
    )]
    source_paths: Vec<String>,

    /// Project to import localizations into
    #[arg(long, env = "LOCPORT_PROJECT")]
    project: String,

    /// Number of import tool invocations allowed to run at the same time
    #[arg(long, env = "LOCPORT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Substitute import tool, invoked as `<tool> <project> <path>`
    #[arg(long)]
    tool: Option<String>,

    /// Kill an import that runs longer than this many seconds
    #[arg(long, value_name = "SECONDS")]
    task_timeout: Option<u64>,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // The prefixed aggregate log owns stdout; diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let tasks = plan_tasks(cli.source_paths, &cli.project)?;
    let tool = match cli.tool {
        Some(program) => ToolSpec::program(program),
        None => ToolSpec::xcodebuild(),
    };
    let config = RunConfig {
        concurrency: cli.concurrency,
        tool,
        task_timeout: cli.task_timeout.map(Duration::from_secs),
    };

    let report = execute_run(tasks, OutputCollector::stdout(), config).await?;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report).context("serializing run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    if !report.outcome.overall_success {
        for task_id in &report.outcome.failed_task_ids {
            eprintln!("import failed: {}", task_id);
        }
        std::process::exit(report.outcome.exit_code());
    }

    Ok(())
}
