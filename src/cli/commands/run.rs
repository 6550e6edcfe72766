//! `run` command
//!
//! Starts one attempt on a [`SimulatedPanel`], drives the panel from
//! console commands on stdin and redraws the status screen whenever the
//! board or the verdict changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::RunArgs;
use crate::config::{AttemptConfig, ConfigLoader, DeviceConfig};
use crate::engine::{Attempt, StatusBoard};
use crate::error::{DefuseError, ExitCode};
use crate::observability::events::EventEmitter;
use crate::presentation;
use crate::sensor::console::{ConsoleContext, ConsoleExit, run_console};
use crate::sensor::{Sensor, SimulatedPanel};
use crate::verdict::{Overall, Verdict};

/// Builds the attempt configuration from the file and CLI overrides.
///
/// # Errors
///
/// Returns a configuration error if loading, resolving or the overridden
/// values fail validation.
pub fn resolve_config(args: &RunArgs) -> Result<AttemptConfig, DefuseError> {
    let document = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "loading configuration");
            let result = ConfigLoader::with_defaults().load(path)?;
            for warning in &result.warnings {
                warn!(path = %warning.path, "{}", warning.message);
            }
            result.config
        }
        None => DeviceConfig::default(),
    };

    let mut config = AttemptConfig::resolve(&document, args.seed)?;
    if let Some(strikes) = args.strikes {
        config.strikes = strikes;
    }
    if let Some(countdown) = args.countdown {
        config.countdown = countdown;
    }
    config.validate()?;
    Ok(config)
}

/// Maps a final verdict to the process exit code.
#[must_use]
pub const fn exit_code(overall: Overall) -> i32 {
    match overall {
        Overall::Defused => ExitCode::SUCCESS,
        Overall::Exploded => ExitCode::EXPLODED,
        Overall::Pending => ExitCode::INTERRUPTED,
    }
}

/// Redraws the screen on every board or verdict change, at most once per
/// `refresh`, until the attempt's tasks are cancelled.
async fn render_loop(board: Arc<StatusBoard>, verdict: Arc<Verdict>, refresh: Duration) {
    let cancel = verdict.cancellation();
    let updates = WatchStream::new(board.subscribe())
        .map(|_| ())
        .merge(WatchStream::new(verdict.subscribe()).map(|_| ()))
        .throttle(refresh);
    tokio::pin!(updates);

    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = updates.next() => {
                if next.is_none() {
                    break;
                }
                let screen = presentation::render(&board.snapshot(), &verdict.snapshot());
                if stdout.write_all(format!("{screen}\n").as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdout.flush().await;
            }
        }
    }
}

/// Run one attempt to completion.
///
/// Returns `0` when defused, `5` when exploded and `130` when the attempt
/// was interrupted by a signal or a `quit` command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the events file
/// cannot be opened, metrics cannot start, or a worker task fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<i32, DefuseError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let config = resolve_config(args)?;
    let events = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let panel = Arc::new(SimulatedPanel::new());
    let sensor: Arc<dyn Sensor> = panel.clone();
    let poll_interval = config.poll_interval;
    let attempt = Attempt::start(config, sensor, Arc::new(events))?;

    let console = ConsoleContext {
        panel,
        verdict: Arc::clone(attempt.verdict()),
        board: Arc::clone(attempt.board()),
        poll_interval,
    };
    let renderer = tokio::spawn(render_loop(
        Arc::clone(attempt.board()),
        Arc::clone(attempt.verdict()),
        args.refresh,
    ));

    let stdin = BufReader::new(tokio::io::stdin());
    let exit = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        exit = run_console(stdin, tokio::io::stdout(), &console) => Some(exit?),
    };

    match exit {
        // without input the attempt can still end on its own
        Some(ConsoleExit::Eof) => {
            tokio::select! {
                biased;
                () = cancel.cancelled() => attempt.interrupt(),
                _ = attempt.wait() => {}
            }
        }
        Some(ConsoleExit::Finished) => {}
        Some(ConsoleExit::Quit) | None => attempt.interrupt(),
    }

    let board = Arc::clone(attempt.board());
    let snapshot = attempt.shutdown().await?;
    let _ = renderer.await;
    print!("{}", presentation::render(&board.snapshot(), &snapshot));

    Ok(exit_code(snapshot.overall))
}
