//! labsweep - Main Entry Point
//!
//! `labsweep run` executes an experiment file against scripted instruments
//! and streams samples to a viewer; `labsweep view` is that viewer, reading
//! plot messages from stdin.

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use labsweep::{
    config::{ExperimentConfig, ViewerMode},
    control::spawn_stdin_listener,
    stream::{run_viewer, LineViewer, ProcessConsumer, ThreadConsumer},
    Experiment,
};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "labsweep", version, about = "Parameter sweeps over lab instruments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the experiment described by a TOML file.
    Run(RunArgs),
    /// Consume plot messages from stdin until a stop arrives.
    View(ViewArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Experiment file.
    config: PathBuf,
    /// Also write a daily rolling log file to this directory.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
    /// Do not read stop/pause/save commands from stdin.
    #[arg(long)]
    no_listen: bool,
}

#[derive(ClapArgs, Debug)]
struct ViewArgs {
    /// Write a JSON summary of the received lines here when saving.
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::View(args) => view(args),
    }
}

/// Initialize logging to stderr and, optionally, a rolling file
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "labsweep.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,labsweep=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let guard = init_tracing(args.log_dir.as_deref());

    let config = ExperimentConfig::load(&args.config)
        .with_context(|| format!("Failed to load experiment {}", args.config.display()))?;
    tracing::info!("Loaded experiment {}", args.config.display());

    let summary_path = if config.output.save {
        config.viewer.summary_path.clone()
    } else {
        None
    };

    let mut builder = config
        .to_builder()
        .context("Invalid experiment configuration")?;
    match config.viewer.mode {
        ViewerMode::Process => {
            let (program, viewer_args) = viewer_command(&config.viewer.command, summary_path)?;
            builder = builder.consumer(
                ProcessConsumer::spawn(program, viewer_args)
                    .context("Failed to start viewer process")?,
            );
        }
        ViewerMode::Thread => {
            builder = builder.consumer(
                ThreadConsumer::spawn(LineViewer::new(summary_path))
                    .context("Failed to start viewer thread")?,
            );
        }
        ViewerMode::None => {}
    }

    let experiment = builder.build().context("Failed to prepare experiment")?;

    if !args.no_listen {
        if let Some(handle) = experiment.control_handle() {
            spawn_stdin_listener(handle).context("Failed to start command listener")?;
            tracing::info!("Commands: q/stop, p/pause, s/save");
        }
    }

    experiment.run_to_exit(move |experiment: &mut Experiment| {
        match experiment.data_path() {
            Some(path) if experiment.end_time().is_some() => {
                tracing::info!("Results in {}", path.display())
            }
            _ => tracing::info!("Run {} not saved", experiment.run_id()),
        }
        // Flush the file log before the process exits
        drop(guard);
    })
}

/// Program and arguments for the viewer process
fn viewer_command(
    command: &[String],
    summary_path: Option<PathBuf>,
) -> anyhow::Result<(PathBuf, Vec<String>)> {
    if let Some((program, rest)) = command.split_first() {
        return Ok((PathBuf::from(program), rest.to_vec()));
    }

    let exe = std::env::current_exe().context("Failed to locate the labsweep executable")?;
    let mut viewer_args = vec!["view".to_string()];
    if let Some(path) = summary_path {
        viewer_args.push("--summary".to_string());
        viewer_args.push(path.to_string_lossy().into_owned());
    }
    Ok((exe, viewer_args))
}

fn view(args: ViewArgs) -> anyhow::Result<()> {
    let _guard = init_tracing(None);
    let summary = run_viewer(args.summary).context("Viewer failed")?;
    tracing::info!(
        "Viewer received {} message(s), {} line(s), {} point(s)",
        summary.data_messages,
        summary.lines.len(),
        summary.points()
    );
    Ok(())
}
