//! Worker task loops.
//!
//! One task per phase, plus a pause-key watcher and a supervisor that
//! turns verdict changes into events and metrics. Every loop checks the
//! engine-wide cancellation first, so all of them exit within one
//! interval of the verdict leaving `Pending`.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::debounce::{DebouncedInput, EdgeDetector};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::phase::{Outcome, Phase, PhaseId, PhaseKind};
use crate::sensor::{Line, Sensor};
use crate::verdict::Verdict;

use super::StatusBoard;

/// Shared handles every phase worker needs.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub attempt: Uuid,
    pub sensor: Arc<dyn Sensor>,
    pub verdict: Arc<Verdict>,
    pub board: Arc<StatusBoard>,
    pub events: Arc<EventEmitter>,
}

async fn blocked(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Drives one phase until it settles or the engine is cancelled.
pub(crate) async fn run_phase(mut phase: PhaseKind, ctx: WorkerContext) {
    let id = phase.id();
    let cancel = ctx.verdict.cancellation();
    let block = ctx.verdict.block_token(id);
    let mut verdict_rx = ctx.verdict.subscribe();

    let period = phase.interval();
    let mut next_tick = Instant::now() + period;
    let mut interval = tokio::time::interval_at(next_tick, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // time owed to the interrupted interval while paused
    let mut suspended = None;

    phase.set_paused(verdict_rx.borrow_and_update().paused);
    ctx.board.update(phase.status());
    debug!(?period, "worker started");

    let mut block_seen = block.is_none();
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("engine cancelled");
                break;
            }

            () = blocked(block.as_ref()), if !block_seen => {
                block_seen = true;
                if let Some(outcome) = phase.block() {
                    info!(%outcome, "blocked");
                    settle(&phase, outcome, &ctx);
                    break;
                }
            }

            changed = verdict_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let paused = verdict_rx.borrow_and_update().paused;
                let now = Instant::now();
                if paused {
                    suspended.get_or_insert_with(|| next_tick.saturating_duration_since(now));
                }
                if phase.set_paused(paused) {
                    let leftover = suspended.take().unwrap_or(period);
                    trace!(?leftover, "resumed");
                    next_tick = now + leftover;
                    interval.reset_at(next_tick);
                } else if !paused {
                    suspended = None;
                }
            }

            deadline = interval.tick() => {
                next_tick = deadline.max(Instant::now()) + period;
                let settled = phase.tick(ctx.sensor.as_ref());
                ctx.board.update(phase.status());
                if let Some(outcome) = settled {
                    settle(&phase, outcome, &ctx);
                }
                if phase.outcome().is_terminal() {
                    break;
                }
            }
        }
    }
    debug!(outcome = %phase.outcome(), "worker stopped");
}

/// Publishes a terminal outcome: board first, then the verdict.
fn settle(phase: &PhaseKind, outcome: Outcome, ctx: &WorkerContext) {
    let id = phase.id();
    ctx.board.update(phase.status());
    metrics::record_phase_outcome(id, outcome);

    let timestamp = Utc::now();
    match (id, outcome) {
        (_, Outcome::Running) => {}
        (PhaseId::Countdown, Outcome::Failed) => {
            let snapshot = ctx.verdict.report_time_expired();
            ctx.events.emit(Event::PhaseFailed {
                timestamp,
                attempt: ctx.attempt,
                phase: id,
                strikes_remaining: snapshot.strikes_remaining,
            });
        }
        (_, Outcome::Solved) => {
            ctx.verdict.report_solved(id);
            ctx.events.emit(Event::PhaseSolved {
                timestamp,
                attempt: ctx.attempt,
                phase: id,
            });
        }
        (_, Outcome::Failed) => {
            let snapshot = ctx.verdict.report_failure(id);
            metrics::record_strike(snapshot.strikes_remaining);
            ctx.events.emit(Event::PhaseFailed {
                timestamp,
                attempt: ctx.attempt,
                phase: id,
                strikes_remaining: snapshot.strikes_remaining,
            });
        }
    }
}

/// Toggles pause on each debounced press of the pause key.
pub(crate) async fn watch_pause_key(
    sensor: Arc<dyn Sensor>,
    verdict: Arc<Verdict>,
    poll: std::time::Duration,
) {
    let cancel = verdict.cancellation();
    let mut key = DebouncedInput::new(poll, EdgeDetector::with_baseline(false), move || {
        match sensor.read_digital(Line::PauseKey) {
            Ok(held) => Some(held),
            Err(e) => {
                trace!(error = %e, "pause key read failed");
                None
            }
        }
    });
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            pressed = key.next_change() => {
                if pressed {
                    verdict.pause();
                }
            }
        }
    }
    debug!("pause key watcher stopped");
}

/// Emits pause and end-of-attempt events as the verdict changes.
pub(crate) async fn supervise(
    attempt: Uuid,
    verdict: Arc<Verdict>,
    events: Arc<EventEmitter>,
    started: Instant,
) {
    let cancel = verdict.cancellation();
    let mut rx = verdict.subscribe();
    let mut paused = rx.borrow_and_update().paused;
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.paused != paused && !snapshot.overall.is_terminal() {
            paused = snapshot.paused;
            events.emit(Event::PauseChanged {
                timestamp: Utc::now(),
                attempt,
                paused,
            });
        }
        if snapshot.overall.is_terminal() {
            let elapsed = started.elapsed();
            info!(
                overall = %snapshot.overall,
                cause = ?snapshot.cause,
                strikes_remaining = snapshot.strikes_remaining,
                ?elapsed,
                "attempt finished"
            );
            metrics::record_attempt(snapshot.overall, elapsed);
            events.emit(Event::AttemptFinished {
                timestamp: Utc::now(),
                attempt,
                overall: snapshot.overall,
                cause: snapshot.cause,
                strikes_remaining: snapshot.strikes_remaining,
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
            break;
        }
        tokio::select! {
            biased;
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = cancel.cancelled() => {
                // a terminal verdict is published before the token fires
                if !rx.borrow().overall.is_terminal() {
                    debug!("attempt interrupted");
                    break;
                }
            }
        }
    }
}
