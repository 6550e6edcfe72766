//! Countdown phase
//!
//! The device clock. It never solves; its only terminal transition is
//! running out of time, which the engine reports to the verdict as
//! *time expired*. The remaining time is published through a
//! [`ClockView`] so the hold button can read the seconds digits.

use std::time::Duration;

use tokio::sync::watch;

use crate::sensor::Sensor;

use super::{Outcome, Phase, PhaseId};

/// Default countdown step.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Formats a duration as `mm:ss`, truncating sub-second remainders.
#[must_use]
pub fn format_clock(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Read-only view of the countdown's remaining time.
#[derive(Debug, Clone)]
pub struct ClockView(watch::Receiver<Duration>);

impl ClockView {
    /// A view frozen at `remaining`, detached from any countdown.
    #[must_use]
    pub fn fixed(remaining: Duration) -> Self {
        let (_tx, rx) = watch::channel(remaining);
        Self(rx)
    }

    /// Remaining time as last published.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        *self.0.borrow()
    }

    /// The two-digit seconds field of the display (`"07"` for `01:07`).
    #[must_use]
    pub fn seconds_text(&self) -> String {
        format!("{:02}", self.remaining().as_secs() % 60)
    }
}

/// Countdown state.
#[derive(Debug)]
pub struct Countdown {
    remaining: Duration,
    interval: Duration,
    paused: bool,
    outcome: Outcome,
    clock: watch::Sender<Duration>,
}

impl Countdown {
    /// Creates a countdown of `duration`, stepping by `interval` per tick.
    #[must_use]
    pub fn new(duration: Duration, interval: Duration) -> Self {
        let (clock, _) = watch::channel(duration);
        Self {
            remaining: duration,
            interval,
            paused: false,
            outcome: Outcome::Running,
            clock,
        }
    }

    /// Returns a view other phases can read.
    #[must_use]
    pub fn clock(&self) -> ClockView {
        ClockView(self.clock.subscribe())
    }

    /// Time left on the clock.
    #[must_use]
    pub const fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whether the clock is currently stopped.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Toggles the paused flag and returns the new value.
    pub const fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Lets one interval elapse.
    ///
    /// Returns `Some(Outcome::Failed)` on the tick that reaches zero.
    pub fn advance(&mut self) -> Option<Outcome> {
        if self.outcome.is_terminal() || self.paused {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(self.interval);
        self.clock.send_replace(self.remaining);
        if self.remaining.is_zero() {
            return self.outcome.settle(Outcome::Failed);
        }
        None
    }
}

impl Phase for Countdown {
    fn id(&self) -> PhaseId {
        PhaseId::Countdown
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn describe(&self) -> String {
        format_clock(self.remaining)
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&mut self, _sensor: &dyn Sensor) -> Option<Outcome> {
        self.advance()
    }

    fn set_paused(&mut self, paused: bool) -> bool {
        let resumed = self.paused && !paused;
        self.paused = paused;
        resumed
    }
}
