mod classify;
mod cli;
mod compiler;
mod config;
mod engine;
mod error;
mod extract;
mod language;
mod ollama;
mod ui;

use anyhow::{bail, ensure};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::CrucibleConfig;
use crate::engine::{JobEvent, JobManager, JobRequest};
use crate::language::Language;
use crate::ui::JobRenderer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CrucibleConfig::load()?;
    if let Some(max) = cli.max_iterations {
        ensure!(max > 0, "--max-iterations must be at least 1");
    }

    match cli.command {
        Command::Run { task, language } => {
            let overrides = JobOverrides {
                model: cli.model,
                max_iterations: cli.max_iterations,
                timeout_secs: cli.timeout_secs,
            };
            run_task(config, task, language.into(), overrides, cli.verbose).await
        }
        Command::Languages => {
            for language in Language::ALL {
                println!("{language}");
            }
            Ok(())
        }
    }
}

/// Per-job settings taken from the command line, applied over the config.
struct JobOverrides {
    model: Option<String>,
    max_iterations: Option<u32>,
    timeout_secs: Option<u64>,
}

/// Submit one job and render its event stream until it reaches a terminal
/// state. Ctrl-C cancels the job; an aborted job maps to a non-zero exit.
async fn run_task(
    config: CrucibleConfig,
    task: String,
    language: Language,
    overrides: JobOverrides,
    verbose: bool,
) -> anyhow::Result<()> {
    let manager = std::sync::Arc::new(JobManager::new(config));
    let renderer = JobRenderer::start(&task, verbose);
    let mut submission = manager.submit(JobRequest {
        language,
        task,
        model: overrides.model,
        max_iterations: overrides.max_iterations,
        timeout_secs: overrides.timeout_secs,
    });

    tokio::spawn({
        let manager = manager.clone();
        let id = submission.id;
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = manager.cancel(id);
            }
        }
    });

    while let Some(event) = submission.events.recv().await {
        renderer.render(&event);
        match event {
            JobEvent::Completion(_) => {
                if let Ok(report) = manager.status(submission.id) {
                    tracing::debug!(status = %report.status, iterations = report.iteration, "job finished");
                }
                return Ok(());
            }
            JobEvent::Abort(abort) => {
                bail!("job aborted: {} ({})", abort.reason, abort.last_error)
            }
            JobEvent::Iteration(_) => {}
        }
    }
    bail!("event stream closed before the job finished")
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "crucible=debug"
    } else {
        "crucible=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
