use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fsee::cli::Cli;
use fsee::config::TraverseConfig;
use fsee::engine::{Controller, Engine, RunOutcome};
use fsee::event::{Event, EventReceiver};
use fsee::task::{TaskKey, TaskStore, default_home};
use fsee::ui::RunProgress;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(RunOutcome::Exhausted | RunOutcome::Stopped) => ExitCode::SUCCESS,
        Ok(RunOutcome::Aborted) => ExitCode::from(2),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    let mut config = TraverseConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    cli.apply(&mut config);

    let root = tokio::fs::canonicalize(&config.path)
        .await
        .with_context(|| format!("cannot access {}", config.path.display()))?;
    config.path = root.clone();

    let processor = cli.command_processor();
    let program = processor.locate()?;
    info!(program = %program.display(), "processor");
    let home = match &cli.home {
        Some(home) => home.clone(),
        None => default_home()?,
    };
    let key = TaskKey {
        path: root.clone(),
        processor: processor.display(),
        directory_first: config.directory_first,
    };
    let store = TaskStore::open(&home, key)?;
    info!(task = %store.dir().display(), "task directory");

    if cli.fill {
        let names = store.take_ignored()?;
        info!(count = names.len(), "refilling previously ignored entries");
        config.marker = None;
        config.names = Some(names);
    } else if cli.start_over {
        config.marker = None;
    } else if let Some(marker) = store.marker() {
        info!(%marker, "resuming");
        config.marker = Some(marker.to_string());
    }

    let (engine, events) = Engine::new(config, processor).context("invalid configuration")?;
    let interrupts = tokio::spawn(watch_interrupts(engine.controller()));

    let progress = RunProgress::start(&root.display().to_string());
    let controller = engine.controller();
    let fill = cli.fill;
    let consumer = tokio::spawn(async move {
        let mut progress = progress;
        let result = consume(events, store, &mut progress, fill).await;
        if result.is_err() {
            // Progress can no longer be persisted; stop dispatching.
            controller.abort();
        }
        (progress, result)
    });

    let report = engine.run().await;
    interrupts.abort();

    let (progress, result) = consumer
        .await
        .map_err(|e| anyhow!("event consumer failed: {e}"))?;
    progress.finish(&report);
    result?;
    Ok(report.outcome)
}

/// Renders, logs and persists every notification until the engine hangs up.
async fn consume(
    mut events: EventReceiver,
    mut store: TaskStore,
    progress: &mut RunProgress,
    fill: bool,
) -> Result<()> {
    let mut logs = store.logs()?;
    while let Some(event) = events.recv().await {
        progress.event(&event);
        logs.record(&event)?;
        match &event {
            // A fill run walks a name list; its markers mean nothing to the tree walk.
            Event::MoveOn { marker } if !fill => store.set_marker(marker)?,
            Event::End(_) if fill => store.clear_ignored_backup()?,
            _ => {}
        }
    }
    Ok(())
}

/// First Ctrl-C stops discovery and drains; the second aborts.
async fn watch_interrupts(controller: Controller) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    eprintln!("\nInterrupt received, finishing admitted entries...");
    eprintln!("Press Ctrl+C again to abort.");
    controller.quit();

    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("second interrupt, aborting");
    controller.abort();
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("fsee=debug,warn")
    } else {
        EnvFilter::new("fsee=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install logger: {e}"))?;

    Ok(())
}
