//! In-memory device panel.
//!
//! `SimulatedPanel` stands in for the GPIO board: tests and the console
//! driver flip its lines, workers read them through [`Sensor`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::SensorError;

use super::{Line, Sensor, TOGGLE_LINES, WIRE_LINES};

#[derive(Debug, Clone)]
struct PanelState {
    wires: [bool; WIRE_LINES as usize],
    toggles: [bool; TOGGLE_LINES as usize],
    button: bool,
    pause_key: bool,
    keys: Vec<char>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            wires: [true; WIRE_LINES as usize],
            toggles: [false; TOGGLE_LINES as usize],
            button: false,
            pause_key: false,
            keys: Vec::new(),
        }
    }
}

/// Simulated device inputs.
///
/// Starts with every wire plugged in, every toggle down, the button
/// released and no keys held. Out-of-range indices are ignored on write
/// and reported as [`SensorError::Unavailable`] on read.
#[derive(Debug, Default)]
pub struct SimulatedPanel {
    state: RwLock<PanelState>,
    fault: AtomicBool,
}

impl SimulatedPanel {
    /// Creates a panel in its resting state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, PanelState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PanelState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pulls wire `index` out of its socket.
    pub fn unplug_wire(&self, index: u8) {
        if let Some(w) = self.write().wires.get_mut(usize::from(index)) {
            *w = false;
        }
    }

    /// Plugs wire `index` back in.
    pub fn plug_wire(&self, index: u8) {
        if let Some(w) = self.write().wires.get_mut(usize::from(index)) {
            *w = true;
        }
    }

    /// Sets toggle `index` up (`true`) or down.
    pub fn set_toggle(&self, index: u8, up: bool) {
        if let Some(t) = self.write().toggles.get_mut(usize::from(index)) {
            *t = up;
        }
    }

    /// Flips toggle `index` and returns its new position.
    pub fn flip_toggle(&self, index: u8) -> Option<bool> {
        let mut state = self.write();
        let t = state.toggles.get_mut(usize::from(index))?;
        *t = !*t;
        Some(*t)
    }

    /// Holds the pushbutton down.
    pub fn press_button(&self) {
        self.write().button = true;
    }

    /// Lets go of the pushbutton.
    pub fn release_button(&self) {
        self.write().button = false;
    }

    /// Holds or releases the operator pause key.
    pub fn set_pause_key(&self, held: bool) {
        self.write().pause_key = held;
    }

    /// Replaces the set of keypad keys currently held.
    pub fn hold_keys(&self, keys: &[char]) {
        keys.clone_into(&mut self.write().keys);
    }

    /// Releases every keypad key.
    pub fn release_keys(&self) {
        self.write().keys.clear();
    }

    /// While set, every read fails with [`SensorError::Fault`].
    pub fn set_fault(&self, fault: bool) {
        self.fault.store(fault, Ordering::SeqCst);
    }

    fn check_fault(&self) -> Result<(), SensorError> {
        if self.fault.load(Ordering::SeqCst) {
            return Err(SensorError::Fault("injected".to_string()));
        }
        Ok(())
    }
}

impl Sensor for SimulatedPanel {
    fn read_digital(&self, line: Line) -> Result<bool, SensorError> {
        self.check_fault()?;
        let state = self.read();
        let value = match line {
            Line::Wire(i) => state.wires.get(usize::from(i)).copied(),
            Line::Toggle(i) => state.toggles.get(usize::from(i)).copied(),
            Line::Button => Some(state.button),
            Line::PauseKey => Some(state.pause_key),
        };
        value.ok_or(SensorError::Unavailable(line))
    }

    fn read_keypad(&self) -> Result<Vec<char>, SensorError> {
        self.check_fault()?;
        Ok(self.read().keys.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resting_state() {
        let panel = SimulatedPanel::new();
        for i in 0..WIRE_LINES {
            assert!(panel.read_digital(Line::Wire(i)).unwrap());
        }
        for i in 0..TOGGLE_LINES {
            assert!(!panel.read_digital(Line::Toggle(i)).unwrap());
        }
        assert!(!panel.read_digital(Line::Button).unwrap());
        assert!(panel.read_keypad().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_line_unavailable() {
        let panel = SimulatedPanel::new();
        panel.unplug_wire(9);
        assert_eq!(
            panel.read_digital(Line::Wire(9)),
            Err(SensorError::Unavailable(Line::Wire(9)))
        );
        assert_eq!(panel.flip_toggle(7), None);
    }

    #[test]
    fn test_wire_plug_cycle() {
        let panel = SimulatedPanel::new();
        panel.unplug_wire(2);
        assert!(!panel.read_digital(Line::Wire(2)).unwrap());
        panel.plug_wire(2);
        assert!(panel.read_digital(Line::Wire(2)).unwrap());
    }

    #[test]
    fn test_flip_toggle() {
        let panel = SimulatedPanel::new();
        assert_eq!(panel.flip_toggle(1), Some(true));
        assert_eq!(panel.flip_toggle(1), Some(false));
    }

    #[test]
    fn test_keys_and_button() {
        let panel = SimulatedPanel::new();
        panel.hold_keys(&['4', '2']);
        assert_eq!(panel.read_keypad().unwrap(), vec!['4', '2']);
        panel.release_keys();
        assert!(panel.read_keypad().unwrap().is_empty());

        panel.press_button();
        assert!(panel.read_digital(Line::Button).unwrap());
        panel.release_button();
        assert!(!panel.read_digital(Line::Button).unwrap());
    }

    #[test]
    fn test_fault_injection() {
        let panel = SimulatedPanel::new();
        panel.set_fault(true);
        assert!(matches!(
            panel.read_digital(Line::Button),
            Err(SensorError::Fault(_))
        ));
        assert!(panel.read_keypad().is_err());
        panel.set_fault(false);
        assert!(panel.read_keypad().is_ok());
    }
}
