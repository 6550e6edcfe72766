//! Phase engine
//!
//! [`Attempt::start`] builds a fresh verdict and the five phases from an
//! [`AttemptConfig`], then spawns one tokio task per phase. Workers share
//! nothing but the [`Verdict`] and the [`StatusBoard`] they publish to.
//!
//! The attempt ends when the verdict leaves `Pending`; its cancellation
//! token then stops every task. [`Attempt::shutdown`] joins them. Dropping
//! an [`Attempt`] cancels the token too, so no task outlives its handle.

mod worker;

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::DropGuard;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::config::AttemptConfig;
use crate::error::{ConfigError, EngineError};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::phase::{
    ClockView, Combination, Countdown, HoldButton, Phase, PhaseId, PhaseKind, PhaseStatus,
    ToggleBank, WirePair,
};
use crate::sensor::Sensor;
use crate::verdict::{Overall, Verdict, VerdictSnapshot};

use worker::WorkerContext;

// ============================================================================
// Status board
// ============================================================================

/// Latest [`PhaseStatus`] of every phase, for presentation.
///
/// Workers write only their own entry. Readers never block workers.
#[derive(Debug)]
pub struct StatusBoard {
    entries: DashMap<PhaseId, PhaseStatus>,
    version: watch::Sender<u64>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            version: watch::channel(0).0,
        }
    }
}

impl StatusBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `status`, returning `true` if it differs from the previous entry.
    pub fn update(&self, status: PhaseStatus) -> bool {
        let changed = self
            .entries
            .insert(status.id, status.clone())
            .is_none_or(|old| old != status);
        if changed {
            self.version.send_modify(|v| *v = v.wrapping_add(1));
        }
        changed
    }

    /// Latest status of `id`.
    #[must_use]
    pub fn get(&self, id: PhaseId) -> Option<PhaseStatus> {
        self.entries.get(&id).map(|e| e.value().clone())
    }

    /// Every published status, in display order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PhaseStatus> {
        PhaseId::ALL.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Receiver notified whenever any entry changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

// ============================================================================
// Attempt
// ============================================================================

/// One running attempt at defusing the device.
pub struct Attempt {
    id: Uuid,
    config: AttemptConfig,
    verdict: Arc<Verdict>,
    board: Arc<StatusBoard>,
    clock: ClockView,
    handles: Vec<(Option<PhaseId>, JoinHandle<()>)>,
    _cancel_on_drop: DropGuard,
}

impl std::fmt::Debug for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attempt")
            .field("id", &self.id)
            .field("verdict", &self.verdict)
            .field("tasks", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl Attempt {
    /// Validates `config` and starts every worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configuration is not
    /// playable. No task is spawned in that case.
    pub fn start(
        config: AttemptConfig,
        sensor: Arc<dyn Sensor>,
        events: Arc<EventEmitter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let id = Uuid::new_v4();
        let started = Instant::now();
        let verdict = Arc::new(Verdict::new(config.strikes));
        let board = Arc::new(StatusBoard::new());

        let countdown = Countdown::new(config.countdown, config.tick_interval);
        let clock = countdown.clock();
        let poll = config.poll_interval;
        let phases: [PhaseKind; 5] = [
            countdown.into(),
            Combination::new(config.combination.clone(), poll).into(),
            WirePair::new(config.wire_color, poll).into(),
            HoldButton::new(config.button_color, config.button_digit, clock.clone(), poll).into(),
            ToggleBank::new(config.toggle_target, poll).into(),
        ];

        let span = info_span!("attempt", attempt = %id);
        span.in_scope(|| {
            info!(
                strikes = config.strikes,
                countdown = ?config.countdown,
                "attempt started"
            );
        });
        metrics::set_strikes_remaining(config.strikes);
        events.emit(Event::AttemptStarted {
            timestamp: Utc::now(),
            attempt: id,
            strikes: config.strikes,
            countdown_secs: config.countdown.as_secs(),
        });

        let ctx = WorkerContext {
            attempt: id,
            sensor: Arc::clone(&sensor),
            verdict: Arc::clone(&verdict),
            board: Arc::clone(&board),
            events: Arc::clone(&events),
        };

        let mut handles = Vec::with_capacity(phases.len() + 2);
        for phase in phases {
            let phase_id = phase.id();
            let task = worker::run_phase(phase, ctx.clone())
                .instrument(info_span!(parent: &span, "phase", phase = %phase_id));
            handles.push((Some(phase_id), tokio::spawn(task)));
        }
        if config.pause_key {
            let task = worker::watch_pause_key(sensor, Arc::clone(&verdict), poll)
                .instrument(info_span!(parent: &span, "pause_key"));
            handles.push((None, tokio::spawn(task)));
        }
        let task = worker::supervise(id, Arc::clone(&verdict), events, started)
            .instrument(info_span!(parent: &span, "supervisor"));
        handles.push((None, tokio::spawn(task)));

        Ok(Self {
            id,
            config,
            _cancel_on_drop: verdict.cancellation().drop_guard(),
            verdict,
            board,
            clock,
            handles,
        })
    }

    /// Attempt identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &AttemptConfig {
        &self.config
    }

    /// The shared verdict.
    #[must_use]
    pub const fn verdict(&self) -> &Arc<Verdict> {
        &self.verdict
    }

    /// The status board.
    #[must_use]
    pub const fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    /// Read-only view of the countdown.
    #[must_use]
    pub fn clock(&self) -> ClockView {
        self.clock.clone()
    }

    /// Overall outcome so far.
    #[must_use]
    pub fn overall(&self) -> Overall {
        self.verdict.overall()
    }

    /// Strikes left.
    #[must_use]
    pub fn strikes_remaining(&self) -> u32 {
        self.verdict.strikes_remaining()
    }

    /// Toggles pause. No-op once the attempt is over.
    pub fn pause(&self) -> VerdictSnapshot {
        self.verdict.pause()
    }

    /// Clears pause. No-op once the attempt is over.
    pub fn resume(&self) -> VerdictSnapshot {
        self.verdict.resume()
    }

    /// Asks `phase` to force itself terminal.
    pub fn block(&self, phase: PhaseId) -> bool {
        self.verdict.block(phase)
    }

    /// Current status of every phase.
    #[must_use]
    pub fn status(&self) -> Vec<PhaseStatus> {
        self.board.snapshot()
    }

    /// Waits for the verdict to leave `Pending`.
    pub async fn wait(&self) -> VerdictSnapshot {
        self.verdict.finished().await
    }

    /// Stops every task without deciding the verdict.
    pub fn interrupt(&self) {
        if !self.verdict.overall().is_terminal() {
            info!(attempt = %self.id, "attempt interrupted");
        }
        self.verdict.cancellation().cancel();
    }

    /// Stops every task and waits for them to exit.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` for the first task that panicked.
    pub async fn shutdown(self) -> Result<VerdictSnapshot, EngineError> {
        self.interrupt();
        let mut first_error = None;
        for (phase, handle) in self.handles {
            if let Err(e) = handle.await {
                let error = match phase {
                    Some(phase) => EngineError::WorkerFailed {
                        phase,
                        message: e.to_string(),
                    },
                    None => EngineError::ControlFailed(e.to_string()),
                };
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or_else(|| Ok(self.verdict.snapshot()), Err)
    }

    /// Waits for the attempt to end, then joins every task.
    ///
    /// # Errors
    ///
    /// See [`shutdown`](Self::shutdown).
    pub async fn run_to_end(self) -> Result<VerdictSnapshot, EngineError> {
        self.wait().await;
        self.shutdown().await
    }
}
