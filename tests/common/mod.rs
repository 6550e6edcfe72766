//! Shared integration-test harness: an attempt on a simulated panel, and
//! helpers for spawning the `defuse` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use defuse::config::AttemptConfig;
use defuse::engine::Attempt;
use defuse::observability::EventEmitter;
use defuse::phase::{PhaseId, PhaseStatus};
use defuse::sensor::SimulatedPanel;
use defuse::sensor::console::{ConsoleCommand, ConsoleContext};

/// Input sampling interval used by every test attempt.
pub const POLL: Duration = Duration::from_millis(100);

/// A running attempt together with the panel that feeds it.
pub struct Rig {
    pub panel: Arc<SimulatedPanel>,
    pub attempt: Attempt,
    pub console: ConsoleContext,
}

impl Rig {
    /// Starts an attempt with `config` and no event output.
    pub fn start(config: AttemptConfig) -> Self {
        Self::start_with_events(config, EventEmitter::noop())
    }

    /// Starts an attempt writing events to `events`.
    pub fn start_with_events(config: AttemptConfig, events: EventEmitter) -> Self {
        let panel = Arc::new(SimulatedPanel::new());
        let attempt = Attempt::start(
            AttemptConfig {
                poll_interval: POLL,
                ..config
            },
            panel.clone(),
            Arc::new(events),
        )
        .expect("config should be valid");
        let console = ConsoleContext {
            panel: Arc::clone(&panel),
            verdict: Arc::clone(attempt.verdict()),
            board: Arc::clone(attempt.board()),
            poll_interval: POLL,
        };
        Self {
            panel,
            attempt,
            console,
        }
    }

    /// Applies one console command line.
    pub async fn send(&self, line: &str) {
        let command: ConsoleCommand = line.parse().expect("valid console command");
        self.console.apply(&command).await;
    }

    /// Waits long enough for every worker to debounce the current inputs.
    pub async fn settle(&self) {
        tokio::time::sleep(POLL * 4).await;
    }

    /// Latest status of one phase.
    pub fn status(&self, id: PhaseId) -> PhaseStatus {
        self.attempt
            .board()
            .get(id)
            .expect("every phase publishes a status")
    }
}

/// Path to a test fixture.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the binary to completion with `args` and `stdin` as input.
pub fn spawn_command_with_input(args: &[&str], stdin: &str) -> Output {
    use std::io::Write;

    let mut child = Command::new(env!("CARGO_BIN_EXE_defuse"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn defuse");
    let mut pipe = child.stdin.take().expect("stdin not captured");
    pipe.write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    drop(pipe);
    child.wait_with_output().expect("failed to wait for defuse")
}

/// Runs the binary to completion with `args` and empty stdin.
pub fn spawn_command(args: &[&str]) -> Output {
    spawn_command_with_input(args, "")
}
