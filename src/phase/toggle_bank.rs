//! Toggle bank phase
//!
//! Four switches read as a 4-bit pattern, switch 0 in the most
//! significant bit. Only the exact target counts; wrong patterns never
//! fail the phase. A block request forces it solved.

use std::time::Duration;

use tracing::{debug, trace};

use crate::debounce::EdgeDetector;
use crate::sensor::{Sensor, read_toggles};

use super::{DEFUSED_TEXT, Outcome, Phase, PhaseId};

/// A 4-bit toggle pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TogglePattern(u8);

impl TogglePattern {
    /// Largest valid pattern.
    pub const MAX: u8 = 0b1111;

    /// Keeps the low four bits of `bits`.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MAX)
    }

    /// The pattern as an integer.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for TogglePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04b}", self.0)
    }
}

impl std::str::FromStr for TogglePattern {
    type Err = String;

    /// Accepts four binary digits (`"0110"`) or hex with a `0x` prefix (`"0x6"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u8::from_str_radix(hex, 16).ok()
        } else if s.len() == 4 {
            u8::from_str_radix(s, 2).ok()
        } else {
            None
        };
        match parsed {
            Some(bits) if bits <= Self::MAX => Ok(Self(bits)),
            _ => Err(format!(
                "'{s}' is not a 4-bit pattern (expected e.g. \"0110\" or \"0x6\")"
            )),
        }
    }
}

/// Toggle bank state.
#[derive(Debug)]
pub struct ToggleBank {
    target: TogglePattern,
    current: Option<TogglePattern>,
    outcome: Outcome,
    interval: Duration,
    detector: EdgeDetector<u8>,
}

impl ToggleBank {
    /// Creates a toggle bank phase targeting `target`.
    #[must_use]
    pub const fn new(target: TogglePattern, interval: Duration) -> Self {
        Self {
            target,
            current: None,
            outcome: Outcome::Running,
            interval,
            detector: EdgeDetector::new(),
        }
    }

    /// Target pattern.
    #[must_use]
    pub const fn target(&self) -> TogglePattern {
        self.target
    }

    /// Last stable switch pattern, if one has settled.
    #[must_use]
    pub const fn current(&self) -> Option<TogglePattern> {
        self.current
    }

    /// Judges a stable pattern.
    pub fn evaluate(&mut self, pattern: TogglePattern) -> Option<Outcome> {
        if self.outcome.is_terminal() {
            return None;
        }
        self.current = Some(pattern);
        if pattern == self.target {
            return self.outcome.settle(Outcome::Solved);
        }
        None
    }
}

impl Phase for ToggleBank {
    fn id(&self) -> PhaseId {
        PhaseId::ToggleBank
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn describe(&self) -> String {
        if self.outcome == Outcome::Solved {
            DEFUSED_TEXT.to_string()
        } else {
            format!("{:#x}", self.target.bits())
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&mut self, sensor: &dyn Sensor) -> Option<Outcome> {
        if self.outcome.is_terminal() {
            return None;
        }
        let bits = match read_toggles(sensor) {
            Ok(bits) => bits,
            Err(e) => {
                trace!(error = %e, "toggle read failed");
                return None;
            }
        };
        let changed = TogglePattern::from_bits(self.detector.feed(bits)?);
        debug!(pattern = %changed, "toggles changed");
        self.evaluate(changed)
    }

    fn block(&mut self) -> Option<Outcome> {
        self.outcome.settle(Outcome::Solved)
    }
}
