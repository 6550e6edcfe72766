//! Configuration schema
//!
//! [`DeviceConfig`] mirrors the YAML document: every section and field is
//! optional and unknown fields are rejected. [`AttemptConfig`] is the
//! resolved form the engine runs on, with every random target drawn once.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::debounce::DEFAULT_POLL_INTERVAL;
use crate::error::{ConfigError, Severity, ValidationIssue};
use crate::phase::combination::is_keypad_key;
use crate::phase::countdown::DEFAULT_TICK_INTERVAL;
use crate::phase::{ButtonColor, TogglePattern, WireColor};

/// Default strike budget.
pub const DEFAULT_STRIKES: u32 = 3;

/// Default countdown length.
pub const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(300);

/// Default length of a random combination.
pub const DEFAULT_COMBINATION_LENGTH: usize = 4;

/// Longest combination accepted.
pub const MAX_COMBINATION_LENGTH: usize = 16;

// ============================================================================
// YAML document
// ============================================================================

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Attempt-wide settings.
    pub attempt: AttemptSection,
    /// Keypad combination.
    pub combination: CombinationSection,
    /// Wire pair.
    pub wire_pair: WirePairSection,
    /// Hold button.
    pub hold_button: HoldButtonSection,
    /// Toggle bank.
    pub toggle_bank: ToggleBankSection,
    /// Operator controls.
    pub controls: ControlsSection,
}

/// `attempt:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttemptSection {
    /// Strike budget.
    pub strikes: Option<u32>,
    /// Countdown length (`"5m"`, `"90s"`).
    pub countdown: Option<String>,
    /// Countdown step.
    pub tick_interval: Option<String>,
    /// Input sampling interval.
    pub poll_interval: Option<String>,
    /// Seed for random targets.
    pub seed: Option<u64>,
}

/// `combination:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombinationSection {
    /// Fixed target; random digits when absent.
    pub target: Option<String>,
    /// Length of a random target.
    pub length: Option<usize>,
}

/// `wire_pair:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WirePairSection {
    /// Target colour name; random when absent.
    pub color: Option<String>,
}

/// `hold_button:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HoldButtonSection {
    /// `red`, `green` or `blue`; random when absent.
    pub color: Option<String>,
    /// Digit required on release for green and blue.
    pub digit: Option<u8>,
}

/// `toggle_bank:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToggleBankSection {
    /// `"0110"` or `"0x6"`; random non-zero pattern when absent.
    pub target: Option<String>,
}

/// `controls:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlsSection {
    /// Watch the physical pause key.
    pub pause_key: bool,
}

/// Parses a humantime duration for `field`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for malformed input.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("a duration such as \"90s\" or \"5m\" ({e})"),
    })
}

fn parse_field<T: std::str::FromStr<Err = String>>(
    field: &str,
    value: &str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|e: String| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: e,
    })
}

// ============================================================================
// Resolved attempt
// ============================================================================

/// Everything one attempt needs, with every target fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptConfig {
    /// Strike budget.
    pub strikes: u32,
    /// Countdown length.
    pub countdown: Duration,
    /// Countdown step.
    pub tick_interval: Duration,
    /// Input sampling interval.
    pub poll_interval: Duration,
    /// Keypad target.
    pub combination: String,
    /// Wire pair target.
    pub wire_color: WireColor,
    /// Button release colour.
    pub button_color: ButtonColor,
    /// Digit required on release, `None` for a plain release.
    pub button_digit: Option<u8>,
    /// Toggle bank target.
    pub toggle_target: TogglePattern,
    /// Watch the pause key line.
    pub pause_key: bool,
}

impl Default for AttemptConfig {
    /// Default timing with a fixed practice layout.
    fn default() -> Self {
        Self {
            strikes: DEFAULT_STRIKES,
            countdown: DEFAULT_COUNTDOWN,
            tick_interval: DEFAULT_TICK_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            combination: "1234".to_string(),
            wire_color: WireColor::Amber,
            button_color: ButtonColor::Red,
            button_digit: None,
            toggle_target: TogglePattern::from_bits(0b0110),
            pause_key: false,
        }
    }
}

impl AttemptConfig {
    /// Resolves a document into an attempt, drawing absent targets once.
    ///
    /// `seed` overrides `attempt.seed`; with neither, targets come from OS
    /// entropy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first field that does not
    /// parse, or a validation error from [`validate`](Self::validate).
    pub fn resolve(config: &DeviceConfig, seed: Option<u64>) -> Result<Self, ConfigError> {
        let mut rng = match seed.or(config.attempt.seed) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let attempt = &config.attempt;
        let duration_or = |field: &str, value: Option<&String>, default: Duration| {
            value.map_or(Ok(default), |v| parse_duration(field, v))
        };

        let combination = match &config.combination.target {
            Some(target) => target.clone(),
            None => {
                let length = config
                    .combination
                    .length
                    .unwrap_or(DEFAULT_COMBINATION_LENGTH);
                (0..length)
                    .map(|_| char::from(b'0' + rng.random_range(0..10_u8)))
                    .collect()
            }
        };

        let wire_color = match &config.wire_pair.color {
            Some(color) => parse_field("wire_pair.color", color)?,
            None => *WireColor::ALL.choose(&mut rng).unwrap_or(&WireColor::Amber),
        };

        let button_color = match &config.hold_button.color {
            Some(color) => parse_field("hold_button.color", color)?,
            None => *ButtonColor::ALL.choose(&mut rng).unwrap_or(&ButtonColor::Red),
        };
        let button_digit = if button_color.needs_digit() {
            Some(
                config
                    .hold_button
                    .digit
                    .unwrap_or_else(|| rng.random_range(0..10)),
            )
        } else {
            None
        };

        let toggle_target = match &config.toggle_bank.target {
            Some(target) => parse_field("toggle_bank.target", target)?,
            None => TogglePattern::from_bits(rng.random_range(1..=TogglePattern::MAX)),
        };

        let resolved = Self {
            strikes: attempt.strikes.unwrap_or(DEFAULT_STRIKES),
            countdown: duration_or(
                "attempt.countdown",
                attempt.countdown.as_ref(),
                DEFAULT_COUNTDOWN,
            )?,
            tick_interval: duration_or(
                "attempt.tick_interval",
                attempt.tick_interval.as_ref(),
                DEFAULT_TICK_INTERVAL,
            )?,
            poll_interval: duration_or(
                "attempt.poll_interval",
                attempt.poll_interval.as_ref(),
                DEFAULT_POLL_INTERVAL,
            )?,
            combination,
            wire_color,
            button_color,
            button_digit,
            toggle_target,
            pause_key: config.controls.pause_key,
        };
        resolved.validate()?;
        Ok(resolved)
    }

    /// Checks the invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` listing every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut error = |path: &str, message: String| {
            errors.push(ValidationIssue {
                path: path.to_string(),
                message,
                severity: Severity::Error,
            });
        };

        if let Some(message) = check_combination(&self.combination) {
            error("combination.target", message);
        }
        for (path, value) in [
            ("attempt.countdown", self.countdown),
            ("attempt.tick_interval", self.tick_interval),
            ("attempt.poll_interval", self.poll_interval),
        ] {
            if value.is_zero() {
                error(path, "must be greater than zero".to_string());
            }
        }
        if let Some(d) = self.button_digit
            && d > 9
        {
            error("hold_button.digit", format!("{d} is not a single digit"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError {
                path: "<attempt>".to_string(),
                errors,
            })
        }
    }
}

/// Returns a description of what is wrong with `target`, if anything.
#[must_use]
pub fn check_combination(target: &str) -> Option<String> {
    if target.is_empty() {
        return Some("combination is empty".to_string());
    }
    let len = target.chars().count();
    if len > MAX_COMBINATION_LENGTH {
        return Some(format!(
            "combination has {len} keys, at most {MAX_COMBINATION_LENGTH} allowed"
        ));
    }
    target
        .chars()
        .find(|&c| !is_keypad_key(c))
        .map(|c| format!("'{c}' is not a keypad key (0-9, *, #)"))
}
