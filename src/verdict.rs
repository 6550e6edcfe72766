//! Attempt-wide verdict
//!
//! The verdict is the only state shared between phase workers: the strike
//! budget, the pause flag and the overall outcome. Every mutation goes
//! through one mutex; readers use the [`watch`] snapshot and never take
//! the lock.
//!
//! `overall` moves once, from `Pending` to `Exploded` or `Defused`. From
//! that moment every operation is a silent no-op and the engine-wide
//! [`CancellationToken`] is cancelled, which stops all workers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::phase::PhaseId;

/// Overall outcome of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Overall {
    /// Still in play.
    #[default]
    Pending,
    /// Time ran out or the strike budget was exhausted.
    Exploded,
    /// Every puzzle phase solved in time.
    Defused,
}

impl Overall {
    /// Returns `true` once the attempt is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Lowercase name, used as a metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Exploded => "exploded",
            Self::Defused => "defused",
        }
    }
}

impl std::fmt::Display for Overall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    /// Every puzzle phase was solved.
    AllSolved,
    /// The countdown reached zero.
    TimeExpired,
    /// A failure arrived with no strikes left.
    StrikesExhausted,
}

impl std::fmt::Display for EndCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AllSolved => "all phases solved",
            Self::TimeExpired => "time expired",
            Self::StrikesExhausted => "strikes exhausted",
        })
    }
}

/// Read-only copy of the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerdictSnapshot {
    /// Failures still allowed before the device explodes.
    pub strikes_remaining: u32,
    /// Whether the countdown is stopped.
    pub paused: bool,
    /// Overall outcome.
    pub overall: Overall,
    /// Set together with a terminal `overall`.
    pub cause: Option<EndCause>,
    /// Phases that reported solved.
    pub solved: BTreeSet<PhaseId>,
}

#[derive(Debug)]
struct VerdictInner {
    strikes_remaining: u32,
    paused: bool,
    overall: Overall,
    cause: Option<EndCause>,
    solved: BTreeSet<PhaseId>,
}

impl VerdictInner {
    fn snapshot(&self) -> VerdictSnapshot {
        VerdictSnapshot {
            strikes_remaining: self.strikes_remaining,
            paused: self.paused,
            overall: self.overall,
            cause: self.cause,
            solved: self.solved.clone(),
        }
    }

    fn end(&mut self, overall: Overall, cause: EndCause) {
        self.overall = overall;
        self.cause = Some(cause);
        self.paused = false;
    }
}

/// Shared verdict of one attempt.
pub struct Verdict {
    inner: Mutex<VerdictInner>,
    snapshot: watch::Sender<VerdictSnapshot>,
    cancel: CancellationToken,
    blocks: BTreeMap<PhaseId, CancellationToken>,
    required: BTreeSet<PhaseId>,
}

impl std::fmt::Debug for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verdict")
            .field("snapshot", &*self.snapshot.borrow())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Verdict {
    /// Creates a pending verdict with `strikes` failures allowed.
    ///
    /// The device defuses once every puzzle phase has reported solved.
    #[must_use]
    pub fn new(strikes: u32) -> Self {
        let inner = VerdictInner {
            strikes_remaining: strikes,
            paused: false,
            overall: Overall::Pending,
            cause: None,
            solved: BTreeSet::new(),
        };
        let (snapshot, _) = watch::channel(inner.snapshot());
        let cancel = CancellationToken::new();
        let blocks = PhaseId::PUZZLES
            .into_iter()
            .filter(|id| id.accepts_block())
            .map(|id| (id, cancel.child_token()))
            .collect();
        Self {
            inner: Mutex::new(inner),
            snapshot,
            cancel,
            blocks,
            required: PhaseId::PUZZLES.into_iter().collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VerdictInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` while pending and publishes the result if it changed
    /// anything. Cancels the engine on the transition out of `Pending`.
    fn mutate(&self, f: impl FnOnce(&mut VerdictInner) -> bool) -> VerdictSnapshot {
        let mut inner = self.lock();
        if inner.overall.is_terminal() {
            return inner.snapshot();
        }
        let changed = f(&mut inner);
        let snapshot = inner.snapshot();
        if changed {
            self.snapshot.send_replace(snapshot.clone());
            if snapshot.overall.is_terminal() {
                self.cancel.cancel();
            }
        }
        snapshot
    }

    /// Records that `phase` solved. Idempotent per phase.
    pub fn report_solved(&self, phase: PhaseId) -> VerdictSnapshot {
        self.mutate(|v| {
            if !v.solved.insert(phase) {
                return false;
            }
            info!(%phase, "phase solved");
            if self.required.is_subset(&v.solved) {
                info!("all phases solved, device defused");
                v.end(Overall::Defused, EndCause::AllSolved);
            }
            true
        })
    }

    /// Charges one strike for a failure in `phase`.
    ///
    /// With no strikes left the device explodes instead.
    pub fn report_failure(&self, phase: PhaseId) -> VerdictSnapshot {
        self.mutate(|v| {
            if let Some(left) = v.strikes_remaining.checked_sub(1) {
                v.strikes_remaining = left;
                warn!(%phase, strikes_remaining = left, "strike");
            } else {
                warn!(%phase, "strike with none left, device exploded");
                v.end(Overall::Exploded, EndCause::StrikesExhausted);
            }
            true
        })
    }

    /// The countdown reached zero. Explodes regardless of strikes.
    pub fn report_time_expired(&self) -> VerdictSnapshot {
        self.mutate(|v| {
            warn!("time expired, device exploded");
            v.end(Overall::Exploded, EndCause::TimeExpired);
            true
        })
    }

    /// Toggles the pause flag.
    pub fn pause(&self) -> VerdictSnapshot {
        self.mutate(|v| {
            v.paused = !v.paused;
            info!(paused = v.paused, "pause toggled");
            true
        })
    }

    /// Clears the pause flag.
    pub fn resume(&self) -> VerdictSnapshot {
        self.mutate(|v| {
            if !v.paused {
                return false;
            }
            v.paused = false;
            info!("resumed");
            true
        })
    }

    /// Asks `phase` to force itself terminal.
    ///
    /// Returns `false` once the attempt is over or for a phase that does
    /// not accept blocks.
    pub fn block(&self, phase: PhaseId) -> bool {
        let inner = self.lock();
        if inner.overall.is_terminal() {
            return false;
        }
        let Some(token) = self.blocks.get(&phase) else {
            return false;
        };
        info!(%phase, "block requested");
        token.cancel();
        true
    }

    /// Token cancelled when `phase` is asked to block.
    #[must_use]
    pub fn block_token(&self, phase: PhaseId) -> Option<CancellationToken> {
        self.blocks.get(&phase).cloned()
    }

    /// Current snapshot without taking the lock.
    #[must_use]
    pub fn snapshot(&self) -> VerdictSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VerdictSnapshot> {
        self.snapshot.subscribe()
    }

    /// Overall outcome.
    #[must_use]
    pub fn overall(&self) -> Overall {
        self.snapshot.borrow().overall
    }

    /// Strikes left.
    #[must_use]
    pub fn strikes_remaining(&self) -> u32 {
        self.snapshot.borrow().strikes_remaining
    }

    /// Whether the countdown is stopped.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.snapshot.borrow().paused
    }

    /// Token cancelled when the attempt ends.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits until `overall` leaves `Pending`.
    pub async fn finished(&self) -> VerdictSnapshot {
        let mut rx = self.subscribe();
        // the sender lives in `self`, so this cannot observe a closed channel
        let done = rx.wait_for(|s| s.overall.is_terminal()).await.map(|s| s.clone());
        done.unwrap_or_else(|_| self.snapshot())
    }
}
