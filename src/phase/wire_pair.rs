//! Wire pair phase
//!
//! Five jumper wires; the target colour names the two that must be pulled.
//! The phase solves once exactly that pair is unplugged and fails as soon
//! as any wire outside the pair comes out. Unplugging a subset of the pair
//! keeps it running.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::debounce::EdgeDetector;
use crate::sensor::{Sensor, read_unplugged};

use super::{DEFUSED_TEXT, Outcome, Phase, PhaseId};

/// Colour label of a wire pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireColor {
    /// Lines 0 and 1.
    Vermillion,
    /// Lines 0 and 2.
    Orange,
    /// Lines 0 and 3.
    Brown,
    /// Lines 0 and 4.
    Purple,
    /// Lines 1 and 2.
    Amber,
    /// Lines 1 and 3.
    Olive,
    /// Lines 2 and 3.
    Lime,
}

impl WireColor {
    /// Every colour.
    pub const ALL: [Self; 7] = [
        Self::Vermillion,
        Self::Orange,
        Self::Brown,
        Self::Purple,
        Self::Amber,
        Self::Olive,
        Self::Lime,
    ];

    /// The two line indices this colour names.
    #[must_use]
    pub const fn lines(self) -> (u8, u8) {
        match self {
            Self::Vermillion => (0, 1),
            Self::Orange => (0, 2),
            Self::Brown => (0, 3),
            Self::Purple => (0, 4),
            Self::Amber => (1, 2),
            Self::Olive => (1, 3),
            Self::Lime => (2, 3),
        }
    }

    /// The pair as a bitmask over line indices.
    #[must_use]
    pub const fn mask(self) -> u8 {
        let (a, b) = self.lines();
        (1 << a) | (1 << b)
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vermillion => "vermillion",
            Self::Orange => "orange",
            Self::Brown => "brown",
            Self::Purple => "purple",
            Self::Amber => "amber",
            Self::Olive => "olive",
            Self::Lime => "lime",
        }
    }
}

impl std::fmt::Display for WireColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WireColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown wire colour '{s}'"))
    }
}

/// Wire pair state.
#[derive(Debug)]
pub struct WirePair {
    color: WireColor,
    unplugged: u8,
    outcome: Outcome,
    interval: Duration,
    detector: EdgeDetector<u8>,
}

impl WirePair {
    /// Creates a wire pair phase targeting `color`.
    #[must_use]
    pub const fn new(color: WireColor, interval: Duration) -> Self {
        Self {
            color,
            unplugged: 0,
            outcome: Outcome::Running,
            interval,
            detector: EdgeDetector::new(),
        }
    }

    /// Target colour.
    #[must_use]
    pub const fn color(&self) -> WireColor {
        self.color
    }

    /// Last stable set of unplugged lines.
    #[must_use]
    pub const fn unplugged(&self) -> u8 {
        self.unplugged
    }

    /// Judges a stable unplugged-line mask.
    pub fn evaluate(&mut self, unplugged: u8) -> Option<Outcome> {
        if self.outcome.is_terminal() {
            return None;
        }
        self.unplugged = unplugged;
        let pair = self.color.mask();
        if unplugged == pair {
            self.outcome.settle(Outcome::Solved)
        } else if unplugged & !pair != 0 {
            self.outcome.settle(Outcome::Failed)
        } else {
            None
        }
    }
}

impl Phase for WirePair {
    fn id(&self) -> PhaseId {
        PhaseId::WirePair
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn describe(&self) -> String {
        if self.outcome == Outcome::Solved {
            DEFUSED_TEXT.to_string()
        } else {
            self.color.to_string()
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&mut self, sensor: &dyn Sensor) -> Option<Outcome> {
        if self.outcome.is_terminal() {
            return None;
        }
        let mask = match read_unplugged(sensor) {
            Ok(mask) => mask,
            Err(e) => {
                trace!(error = %e, "wire read failed");
                return None;
            }
        };
        let changed = self.detector.feed(mask)?;
        debug!(unplugged = format_args!("{changed:05b}"), "wires changed");
        self.evaluate(changed)
    }
}
