//! Phase state machines
//!
//! Each puzzle subsystem of the device is one phase. A phase owns its
//! private state, samples its own inputs on every [`Phase::tick`], and
//! settles exactly once on [`Outcome::Solved`] or [`Outcome::Failed`].
//!
//! # Architecture
//!
//! - [`Phase`]: common interface (`id`, `outcome`, `describe`, `tick`)
//! - [`PhaseKind`]: sum type over the five phase variants
//! - [`countdown`], [`combination`], [`wire_pair`], [`hold_button`],
//!   [`toggle_bank`]: the variants themselves
//!
//! Phases never touch each other. The only cross-phase read is the
//! countdown's [`ClockView`], which the hold button consults on release.

pub mod combination;
pub mod countdown;
pub mod hold_button;
pub mod toggle_bank;
pub mod wire_pair;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sensor::Sensor;

pub use combination::Combination;
pub use countdown::{ClockView, Countdown};
pub use hold_button::{ButtonColor, HoldButton};
pub use toggle_bank::{ToggleBank, TogglePattern};
pub use wire_pair::{WireColor, WirePair};

/// Text shown for a solved phase.
pub const DEFUSED_TEXT: &str = "DEFUSED";

/// Identifies one of the five phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    /// The shared countdown.
    Countdown,
    /// Keypad combination.
    Combination,
    /// Pair of jumper wires.
    WirePair,
    /// Press-and-release button.
    HoldButton,
    /// Bank of four toggle switches.
    ToggleBank,
}

impl PhaseId {
    /// Every phase, in display order.
    pub const ALL: [Self; 5] = [
        Self::Countdown,
        Self::Combination,
        Self::WirePair,
        Self::HoldButton,
        Self::ToggleBank,
    ];

    /// Phases that must be solved to defuse the device.
    pub const PUZZLES: [Self; 4] = [
        Self::Combination,
        Self::WirePair,
        Self::HoldButton,
        Self::ToggleBank,
    ];

    /// Whether the phase can be forced terminal by a block request.
    #[must_use]
    pub const fn accepts_block(self) -> bool {
        matches!(self, Self::ToggleBank)
    }

    /// Machine-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Countdown => "countdown",
            Self::Combination => "combination",
            Self::WirePair => "wire_pair",
            Self::HoldButton => "hold_button",
            Self::ToggleBank => "toggle_bank",
        }
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

/// Where a phase stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Still accepting input.
    #[default]
    Running,
    /// Solved; counts toward defusing the device.
    Solved,
    /// Failed; already charged a strike (or, for the countdown, time ran out).
    Failed,
}

impl Outcome {
    /// Returns `true` for `Solved` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Moves a running outcome to `to`. Terminal outcomes never change.
    ///
    /// Returns the new outcome if this call settled it.
    pub fn settle(&mut self, to: Self) -> Option<Self> {
        if self.is_terminal() || !to.is_terminal() {
            return None;
        }
        *self = to;
        Some(to)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Solved => "solved",
            Self::Failed => "failed",
        })
    }
}

/// Read-only snapshot of a phase for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseStatus {
    /// Which phase.
    pub id: PhaseId,
    /// Its outcome when the snapshot was taken.
    pub outcome: Outcome,
    /// Output of [`Phase::describe`].
    pub text: String,
}

/// Common interface of every phase.
pub trait Phase: Send {
    /// Which phase this is.
    fn id(&self) -> PhaseId;

    /// Current outcome.
    fn outcome(&self) -> Outcome;

    /// Human-readable state. Pure: never mutates the phase.
    fn describe(&self) -> String;

    /// Sampling period of this phase's worker.
    fn interval(&self) -> Duration;

    /// Samples input once and advances the state machine.
    ///
    /// Returns the outcome if this tick settled the phase. A terminal
    /// phase always returns `None` without reading the sensor.
    fn tick(&mut self, sensor: &dyn Sensor) -> Option<Outcome>;

    /// Tells the phase whether the attempt is paused.
    ///
    /// Returns `true` if the phase just resumed and its worker should
    /// restart its interval.
    fn set_paused(&mut self, _paused: bool) -> bool {
        false
    }

    /// Forces the phase terminal on demand. Phases that cannot be blocked
    /// ignore the request.
    fn block(&mut self) -> Option<Outcome> {
        None
    }

    /// Snapshot for the status board.
    fn status(&self) -> PhaseStatus {
        PhaseStatus {
            id: self.id(),
            outcome: self.outcome(),
            text: self.describe(),
        }
    }
}

/// One phase of any kind.
#[derive(Debug)]
pub enum PhaseKind {
    /// See [`Countdown`].
    Countdown(Countdown),
    /// See [`Combination`].
    Combination(Combination),
    /// See [`WirePair`].
    WirePair(WirePair),
    /// See [`HoldButton`].
    HoldButton(HoldButton),
    /// See [`ToggleBank`].
    ToggleBank(ToggleBank),
}

macro_rules! each_phase {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            PhaseKind::Countdown($p) => $body,
            PhaseKind::Combination($p) => $body,
            PhaseKind::WirePair($p) => $body,
            PhaseKind::HoldButton($p) => $body,
            PhaseKind::ToggleBank($p) => $body,
        }
    };
}

impl Phase for PhaseKind {
    fn id(&self) -> PhaseId {
        each_phase!(self, p => p.id())
    }

    fn outcome(&self) -> Outcome {
        each_phase!(self, p => p.outcome())
    }

    fn describe(&self) -> String {
        each_phase!(self, p => p.describe())
    }

    fn interval(&self) -> Duration {
        each_phase!(self, p => p.interval())
    }

    fn tick(&mut self, sensor: &dyn Sensor) -> Option<Outcome> {
        each_phase!(self, p => p.tick(sensor))
    }

    fn set_paused(&mut self, paused: bool) -> bool {
        each_phase!(self, p => p.set_paused(paused))
    }

    fn block(&mut self) -> Option<Outcome> {
        each_phase!(self, p => p.block())
    }
}

impl From<Countdown> for PhaseKind {
    fn from(p: Countdown) -> Self {
        Self::Countdown(p)
    }
}

impl From<Combination> for PhaseKind {
    fn from(p: Combination) -> Self {
        Self::Combination(p)
    }
}

impl From<WirePair> for PhaseKind {
    fn from(p: WirePair) -> Self {
        Self::WirePair(p)
    }
}

impl From<HoldButton> for PhaseKind {
    fn from(p: HoldButton) -> Self {
        Self::HoldButton(p)
    }
}

impl From<ToggleBank> for PhaseKind {
    fn from(p: ToggleBank) -> Self {
        Self::ToggleBank(p)
    }
}
