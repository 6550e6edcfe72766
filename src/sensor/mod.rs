//! Sensor interface
//!
//! The engine never touches hardware directly. Everything it knows about
//! the device comes through [`Sensor`], which reports raw, undebounced
//! readings of digital lines and the keypad.
//!
//! - [`panel::SimulatedPanel`]: in-memory device used by the CLI and tests
//! - [`console`]: text commands that drive a simulated panel

pub mod console;
pub mod panel;

use serde::Serialize;

use crate::error::SensorError;

pub use panel::SimulatedPanel;

/// Number of jumper wire lines.
pub const WIRE_LINES: u8 = 5;

/// Number of toggle switches.
pub const TOGGLE_LINES: u8 = 4;

/// A digital input line on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Line {
    /// Jumper wire continuity, `true` while plugged in (0..5).
    Wire(u8),
    /// Toggle switch position, `true` when up (0..4).
    Toggle(u8),
    /// The big pushbutton, `true` while held.
    Button,
    /// Operator pause key, `true` while held.
    PauseKey,
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wire(i) => write!(f, "wire[{i}]"),
            Self::Toggle(i) => write!(f, "toggle[{i}]"),
            Self::Button => f.write_str("button"),
            Self::PauseKey => f.write_str("pause_key"),
        }
    }
}

/// Raw access to the device inputs.
///
/// Implementations make no debounce guarantees. Reads must not block for
/// longer than a sampling interval.
pub trait Sensor: Send + Sync {
    /// Reads one digital line.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorError`] when the line cannot be read this tick.
    fn read_digital(&self, line: Line) -> Result<bool, SensorError>;

    /// Returns every keypad key currently held, possibly none.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorError`] when the keypad cannot be scanned this tick.
    fn read_keypad(&self) -> Result<Vec<char>, SensorError>;
}

/// Reads all wire lines as a bitmask of *unplugged* lines (bit `i` = wire `i`).
///
/// # Errors
///
/// Fails if any single line fails; a partial reading is never reported.
pub fn read_unplugged(sensor: &dyn Sensor) -> Result<u8, SensorError> {
    let mut mask = 0;
    for i in 0..WIRE_LINES {
        if !sensor.read_digital(Line::Wire(i))? {
            mask |= 1 << i;
        }
    }
    Ok(mask)
}

/// Reads the toggle bank as a 4-bit value, switch 0 in the most significant bit.
///
/// # Errors
///
/// Fails if any single switch fails to read.
pub fn read_toggles(sensor: &dyn Sensor) -> Result<u8, SensorError> {
    let mut bits = 0;
    for i in 0..TOGGLE_LINES {
        bits <<= 1;
        if sensor.read_digital(Line::Toggle(i))? {
            bits |= 1;
        }
    }
    Ok(bits)
}
