//! syncmux CLI - headless batch sync/merge.
//!
//! Usage:
//!     syncmux run --jobs jobs.json --settings settings.toml
//!     syncmux run --jobs jobs.json --analyze-only --json
//!     syncmux tools

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use syncmux_core::io::{ToolPaths, KNOWN_TOOLS};
use syncmux_core::logging::LogSink;
use syncmux_core::models::JobStatus;
use syncmux_core::orchestrator::run_job;
use syncmux_core::{JobSpec, Settings};

#[derive(Parser)]
#[command(
    name = "syncmux",
    version,
    about = "Batch MKV synchronization and remuxing",
    long_about = "Measures per-source timing offsets via audio correlation, corrects \
                  drift/stepping losslessly, adjusts subtitles and chapters to match, \
                  and merges everything through mkvmerge."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of sync/merge jobs
    Run {
        /// Jobs file: a JSON array of job specs
        #[arg(long)]
        jobs: PathBuf,

        /// Settings file (TOML); defaults apply when omitted
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Analyze and report delays without merging
        #[arg(long)]
        analyze_only: bool,

        /// Emit one JSON result per line instead of human-readable text
        #[arg(long)]
        json: bool,

        /// Echo job logs to stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show which external tools were found on PATH
    Tools,
}

/// Sink that relays job log lines to stderr.
struct StderrSink;

impl LogSink for StderrSink {
    fn emit(&self, line: &str) {
        eprintln!("{}", line);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            jobs,
            settings,
            analyze_only,
            json,
            verbose,
        } => run_command(jobs, settings, analyze_only, json, verbose),
        Commands::Tools => tools_command(),
    }
}

fn run_command(
    jobs_path: PathBuf,
    settings_path: Option<PathBuf>,
    analyze_only: bool,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let settings = match settings_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            Settings::from_toml(&text)
                .with_context(|| format!("parsing settings file {}", path.display()))?
        }
        None => Settings::default(),
    };

    let jobs_text = std::fs::read_to_string(&jobs_path)
        .with_context(|| format!("reading jobs file {}", jobs_path.display()))?;
    let mut jobs: Vec<JobSpec> = serde_json::from_str(&jobs_text)
        .with_context(|| format!("parsing jobs file {}", jobs_path.display()))?;
    if analyze_only {
        for job in &mut jobs {
            job.merge = false;
        }
    }

    let tools = ToolPaths::resolve(&BTreeMap::new());
    let sink = if verbose {
        Some(Arc::new(StderrSink) as Arc<dyn LogSink>)
    } else {
        None
    };

    let mut failed = 0usize;
    for spec in jobs {
        let result = run_job(spec, &settings, &tools, sink.clone());
        if result.status == JobStatus::Failed {
            failed += 1;
        }

        if json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            match result.status {
                JobStatus::Merged => println!(
                    "[MERGED]   {} -> {}",
                    result.name,
                    result
                        .output
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ),
                JobStatus::Analyzed => {
                    let delays = result
                        .delays
                        .as_ref()
                        .map(|d| {
                            d.iter()
                                .map(|(k, v)| format!("{}={:+}ms", k, v))
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default();
                    println!("[ANALYZED] {}: {}", result.name, delays);
                }
                JobStatus::Failed => println!(
                    "[FAILED]   {}: {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} job(s) failed", failed);
    }
    Ok(())
}

fn tools_command() -> Result<()> {
    let tools = ToolPaths::resolve(&BTreeMap::new());
    for &tool in KNOWN_TOOLS {
        match tools.get(tool) {
            Some(path) => println!("{:<12} {}", tool, path.display()),
            None => println!("{:<12} (not found)", tool),
        }
    }
    Ok(())
}
