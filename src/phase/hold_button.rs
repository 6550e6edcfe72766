//! Hold button phase
//!
//! Press and release the button. A red button solves on any release; a
//! green or blue one solves only when its digit shows in the countdown's
//! seconds field at the moment of release, and fails otherwise.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::debounce::EdgeDetector;
use crate::sensor::{Line, Sensor};

use super::{ClockView, DEFUSED_TEXT, Outcome, Phase, PhaseId};

/// Colour of the button's release indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonColor {
    /// Plain: any release solves.
    Red,
    /// Needs a digit in the seconds display.
    Green,
    /// Needs a digit in the seconds display.
    Blue,
}

impl ButtonColor {
    /// Every colour.
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Blue];

    /// Whether releasing this colour depends on the countdown.
    #[must_use]
    pub const fn needs_digit(self) -> bool {
        !matches!(self, Self::Red)
    }
}

impl std::fmt::Display for ButtonColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
        })
    }
}

impl std::str::FromStr for ButtonColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown button colour '{s}'"))
    }
}

/// Hold button state.
#[derive(Debug)]
pub struct HoldButton {
    color: ButtonColor,
    digit: Option<u8>,
    pressed: bool,
    pressed_at: Option<Instant>,
    outcome: Outcome,
    interval: Duration,
    clock: ClockView,
    detector: EdgeDetector<bool>,
}

impl HoldButton {
    /// Creates a button phase.
    ///
    /// `digit` is ignored for a red button. A green or blue button without
    /// a digit behaves like a red one.
    #[must_use]
    pub fn new(color: ButtonColor, digit: Option<u8>, clock: ClockView, interval: Duration) -> Self {
        Self {
            color,
            digit: digit.filter(|_| color.needs_digit()),
            pressed: false,
            pressed_at: None,
            outcome: Outcome::Running,
            interval,
            clock,
            detector: EdgeDetector::with_baseline(false),
        }
    }

    /// Release colour.
    #[must_use]
    pub const fn color(&self) -> ButtonColor {
        self.color
    }

    /// Digit required on release, if any.
    #[must_use]
    pub const fn digit(&self) -> Option<u8> {
        self.digit
    }

    /// Whether the button is currently held.
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Records a stable press.
    pub fn press(&mut self) {
        if self.outcome.is_terminal() {
            return;
        }
        self.pressed = true;
        self.pressed_at = Some(Instant::now());
    }

    /// Records a stable release and judges it.
    pub fn release(&mut self) -> Option<Outcome> {
        if self.outcome.is_terminal() || !self.pressed {
            return None;
        }
        self.pressed = false;
        let held = self.pressed_at.take().map(|t| t.elapsed());
        let seconds = self.clock.seconds_text();
        let solved = self
            .digit
            .is_none_or(|d| {
                char::from_digit(d.into(), 10).is_some_and(|c| seconds.contains(c))
            });
        debug!(?held, %seconds, solved, "button released");
        self.outcome
            .settle(if solved { Outcome::Solved } else { Outcome::Failed })
    }
}

impl Phase for HoldButton {
    fn id(&self) -> PhaseId {
        PhaseId::HoldButton
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn describe(&self) -> String {
        match (self.outcome, self.pressed) {
            (Outcome::Solved, _) => DEFUSED_TEXT.to_string(),
            (_, true) => "Pressed".to_string(),
            (_, false) => "Released".to_string(),
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&mut self, sensor: &dyn Sensor) -> Option<Outcome> {
        if self.outcome.is_terminal() {
            return None;
        }
        let down = match sensor.read_digital(Line::Button) {
            Ok(down) => down,
            Err(e) => {
                trace!(error = %e, "button read failed");
                return None;
            }
        };
        if self.detector.feed(down)? {
            self.press();
            None
        } else {
            self.release()
        }
    }
}
