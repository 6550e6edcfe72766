//! Keypad combination phase
//!
//! Keys are appended on each debounced press. The phase solves when the
//! entered sequence equals the target and fails on the first key that
//! leaves the target's prefixes. There is no backspace.
//!
//! When several keys are held at once the lowest code point wins, and
//! rolling from one held key to another without releasing enters nothing.

use std::time::Duration;

use tracing::{debug, trace};

use crate::debounce::EdgeDetector;
use crate::sensor::Sensor;

use super::{DEFUSED_TEXT, Outcome, Phase, PhaseId};

/// Keys present on the keypad.
pub const KEYPAD_KEYS: [char; 12] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '*', '0', '#'];

/// Returns `true` if `c` is a key on the keypad.
#[must_use]
pub fn is_keypad_key(c: char) -> bool {
    KEYPAD_KEYS.contains(&c)
}

/// Combination state.
#[derive(Debug)]
pub struct Combination {
    target: String,
    entered: String,
    outcome: Outcome,
    interval: Duration,
    detector: EdgeDetector<Option<char>>,
}

impl Combination {
    /// Creates a combination phase for `target`.
    ///
    /// The target is assumed to be validated (non-empty, keypad keys only).
    #[must_use]
    pub fn new(target: impl Into<String>, interval: Duration) -> Self {
        Self {
            target: target.into(),
            entered: String::new(),
            outcome: Outcome::Running,
            interval,
            detector: EdgeDetector::with_baseline(None),
        }
    }

    /// The sequence entered so far.
    #[must_use]
    pub fn entered(&self) -> &str {
        &self.entered
    }

    /// Applies one accepted key press.
    pub fn press(&mut self, key: char) -> Option<Outcome> {
        if self.outcome.is_terminal() {
            return None;
        }
        self.entered.push(key);
        if self.entered == self.target {
            self.outcome.settle(Outcome::Solved)
        } else if !self.target.starts_with(&self.entered) {
            self.outcome.settle(Outcome::Failed)
        } else {
            None
        }
    }
}

impl Phase for Combination {
    fn id(&self) -> PhaseId {
        PhaseId::Combination
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn describe(&self) -> String {
        if self.outcome == Outcome::Solved {
            DEFUSED_TEXT.to_string()
        } else {
            self.entered.clone()
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&mut self, sensor: &dyn Sensor) -> Option<Outcome> {
        if self.outcome.is_terminal() {
            return None;
        }
        let keys = match sensor.read_keypad() {
            Ok(keys) => keys,
            Err(e) => {
                trace!(error = %e, "keypad read failed");
                return None;
            }
        };
        let was_idle = matches!(self.detector.stable(), Some(None));
        match self.detector.feed(keys.into_iter().min()) {
            Some(Some(key)) if was_idle => {
                debug!(%key, "key pressed");
                self.press(key)
            }
            Some(Some(key)) => {
                debug!(%key, "key rolled over without release, ignored");
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SimulatedPanel;

    fn phase(target: &str) -> Combination {
        Combination::new(target, Duration::from_millis(100))
    }

    /// Holds `keys` for two samples, then releases for two samples.
    fn tap(phase: &mut Combination, panel: &SimulatedPanel, keys: &[char]) -> Vec<Outcome> {
        let mut settled = Vec::new();
        panel.hold_keys(keys);
        settled.extend(phase.tick(panel));
        settled.extend(phase.tick(panel));
        panel.release_keys();
        settled.extend(phase.tick(panel));
        settled.extend(phase.tick(panel));
        settled
    }

    #[test]
    fn test_correct_sequence_solves() {
        let mut p = phase("1234");
        assert_eq!(p.press('1'), None);
        assert_eq!(p.press('2'), None);
        assert_eq!(p.press('3'), None);
        assert_eq!(p.press('4'), Some(Outcome::Solved));
        assert_eq!(p.describe(), DEFUSED_TEXT);
    }

    #[test]
    fn test_wrong_key_fails_and_stops() {
        let mut p = phase("1234");
        p.press('1');
        p.press('2');
        assert_eq!(p.press('9'), Some(Outcome::Failed));
        assert_eq!(p.press('3'), None);
        assert_eq!(p.entered(), "129");
        assert_eq!(p.describe(), "129");
    }

    #[test]
    fn test_describe_shows_partial_entry() {
        let mut p = phase("1234");
        assert_eq!(p.describe(), "");
        p.press('1');
        p.press('2');
        assert_eq!(p.describe(), "12");
    }

    #[test]
    fn test_ticks_through_keypad() {
        let panel = SimulatedPanel::new();
        let mut p = phase("1234");
        let mut settled = Vec::new();
        for key in ['1', '2', '3', '4'] {
            settled.extend(tap(&mut p, &panel, &[key]));
        }
        assert_eq!(settled, vec![Outcome::Solved]);
    }

    #[test]
    fn test_held_key_enters_once() {
        let panel = SimulatedPanel::new();
        let mut p = phase("11");
        panel.hold_keys(&['1']);
        for _ in 0..10 {
            p.tick(&panel);
        }
        assert_eq!(p.entered(), "1");
        assert_eq!(p.outcome(), Outcome::Running);
    }

    #[test]
    fn test_single_sample_press_is_bounce() {
        let panel = SimulatedPanel::new();
        let mut p = phase("1234");
        panel.hold_keys(&['7']);
        p.tick(&panel);
        panel.release_keys();
        p.tick(&panel);
        p.tick(&panel);
        assert_eq!(p.entered(), "");
    }

    #[test]
    fn test_simultaneous_keys_take_lowest() {
        let panel = SimulatedPanel::new();
        let mut p = phase("31");
        tap(&mut p, &panel, &['9', '3', '5']);
        assert_eq!(p.entered(), "3");
    }

    #[test]
    fn test_roll_over_enters_nothing() {
        let panel = SimulatedPanel::new();
        let mut p = phase("12");
        panel.hold_keys(&['1']);
        p.tick(&panel);
        p.tick(&panel);
        panel.hold_keys(&['2']);
        p.tick(&panel);
        p.tick(&panel);
        panel.release_keys();
        p.tick(&panel);
        p.tick(&panel);
        assert_eq!(p.entered(), "1");
    }

    #[test]
    fn test_sensor_fault_is_no_change() {
        let panel = SimulatedPanel::new();
        let mut p = phase("1");
        panel.hold_keys(&['1']);
        p.tick(&panel);
        panel.set_fault(true);
        assert_eq!(p.tick(&panel), None);
        panel.set_fault(false);
        assert_eq!(p.tick(&panel), Some(Outcome::Solved));
    }

    #[test]
    fn test_keypad_keys() {
        assert!(is_keypad_key('0'));
        assert!(is_keypad_key('#'));
        assert!(is_keypad_key('*'));
        assert!(!is_keypad_key('A'));
    }
}
