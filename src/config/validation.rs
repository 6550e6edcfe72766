//! Configuration validation
//!
//! Runs on the deserialized [`DeviceConfig`] before anything is resolved.
//! Collects every error and warning rather than stopping at the first, so
//! one `defuse validate` run reports everything wrong with a file.

use std::time::Duration;

use crate::config::schema::{
    DEFAULT_COUNTDOWN, DeviceConfig, MAX_COMBINATION_LENGTH, check_combination,
};
use crate::debounce::DEFAULT_POLL_INTERVAL;
use crate::error::{Severity, ValidationIssue};
use crate::phase::countdown::DEFAULT_TICK_INTERVAL;
use crate::phase::{ButtonColor, TogglePattern, WireColor};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that prevent an attempt from starting.
    pub errors: Vec<ValidationIssue>,
    /// Suspicious but playable settings.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &DeviceConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_timing(config);
        self.validate_combination(config);
        self.validate_wire_pair(config);
        self.validate_hold_button(config);
        self.validate_toggle_bank(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_timing(&mut self, config: &DeviceConfig) {
        let attempt = &config.attempt;
        let countdown = self.duration(
            "attempt.countdown",
            attempt.countdown.as_deref(),
            DEFAULT_COUNTDOWN,
        );
        let tick = self.duration(
            "attempt.tick_interval",
            attempt.tick_interval.as_deref(),
            DEFAULT_TICK_INTERVAL,
        );
        let poll = self.duration(
            "attempt.poll_interval",
            attempt.poll_interval.as_deref(),
            DEFAULT_POLL_INTERVAL,
        );

        if let (Some(countdown), Some(tick)) = (countdown, tick)
            && countdown < tick
        {
            self.add_warning(
                "attempt.countdown",
                "countdown is shorter than one tick and expires on the first tick",
            );
        }
        if let (Some(poll), Some(tick)) = (poll, tick)
            && poll >= tick
        {
            self.add_warning(
                "attempt.poll_interval",
                "inputs are sampled no faster than the countdown ticks",
            );
        }
    }

    /// Parses an optional duration, falling back to `default` when absent.
    /// Records an error and returns `None` when it is malformed or zero.
    fn duration(&mut self, path: &str, value: Option<&str>, default: Duration) -> Option<Duration> {
        let Some(value) = value else {
            return Some(default);
        };
        match humantime::parse_duration(value.trim()) {
            Ok(d) if d.is_zero() => {
                self.add_error(path, "must be greater than zero");
                None
            }
            Ok(d) => Some(d),
            Err(e) => {
                self.add_error(path, &format!("invalid duration '{value}': {e}"));
                None
            }
        }
    }

    fn validate_combination(&mut self, config: &DeviceConfig) {
        let section = &config.combination;
        if let Some(target) = &section.target {
            if let Some(message) = check_combination(target) {
                self.add_error("combination.target", &message);
            }
            if section.length.is_some() {
                self.add_warning(
                    "combination.length",
                    "ignored because combination.target is set",
                );
            }
        }
        if let Some(length) = section.length
            && !(1..=MAX_COMBINATION_LENGTH).contains(&length)
        {
            self.add_error(
                "combination.length",
                &format!("must be between 1 and {MAX_COMBINATION_LENGTH}"),
            );
        }
    }

    fn validate_wire_pair(&mut self, config: &DeviceConfig) {
        if let Some(color) = &config.wire_pair.color
            && let Err(e) = color.parse::<WireColor>()
        {
            self.add_error("wire_pair.color", &e);
        }
    }

    fn validate_hold_button(&mut self, config: &DeviceConfig) {
        let section = &config.hold_button;
        let color = match section.color.as_deref().map(str::parse::<ButtonColor>) {
            Some(Ok(color)) => Some(color),
            Some(Err(e)) => {
                self.add_error("hold_button.color", &e);
                None
            }
            None => None,
        };
        if let Some(digit) = section.digit {
            if digit > 9 {
                self.add_error("hold_button.digit", "must be a single digit (0-9)");
            }
            if color == Some(ButtonColor::Red) {
                self.add_warning(
                    "hold_button.digit",
                    "ignored because a red button solves on any release",
                );
            }
        }
    }

    fn validate_toggle_bank(&mut self, config: &DeviceConfig) {
        let Some(target) = &config.toggle_bank.target else {
            return;
        };
        match target.parse::<TogglePattern>() {
            Ok(pattern) if pattern.bits() == 0 => self.add_warning(
                "toggle_bank.target",
                "all switches down is the resting position and solves immediately",
            ),
            Ok(_) => {}
            Err(e) => self.add_error("toggle_bank.target", &e),
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(yaml: &str) -> ValidationResult {
        let config: DeviceConfig = serde_yaml::from_str(yaml).unwrap();
        Validator::new().validate(&config)
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_empty_config_is_valid() {
        let result = validate("{}");
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let result = validate(
            r#"
attempt:
  countdown: 0s
  tick_interval: fast
combination:
  target: "12AB"
wire_pair:
  color: teal
hold_button:
  color: yellow
  digit: 11
toggle_bank:
  target: "10101"
"#,
        );
        assert!(result.has_errors());
        assert_eq!(
            paths(&result.errors),
            vec![
                "attempt.countdown",
                "attempt.tick_interval",
                "combination.target",
                "wire_pair.color",
                "hold_button.color",
                "hold_button.digit",
                "toggle_bank.target",
            ]
        );
    }

    #[test]
    fn test_warnings_do_not_block() {
        let result = validate(
            r#"
attempt:
  countdown: 500ms
  poll_interval: 2s
combination:
  target: "42"
  length: 6
hold_button:
  color: red
  digit: 3
toggle_bank:
  target: "0000"
"#,
        );
        assert!(result.is_valid());
        assert_eq!(
            paths(&result.warnings),
            vec![
                "attempt.countdown",
                "attempt.poll_interval",
                "combination.length",
                "hold_button.digit",
                "toggle_bank.target",
            ]
        );
    }

    #[test]
    fn test_length_out_of_range() {
        let result = validate("combination:\n  length: 0\n");
        assert_eq!(paths(&result.errors), vec!["combination.length"]);
    }

    #[test]
    fn test_validator_is_reusable() {
        let mut validator = Validator::new();
        let bad: DeviceConfig = serde_yaml::from_str("wire_pair:\n  color: teal\n").unwrap();
        assert!(validator.validate(&bad).has_errors());
        assert!(validator.validate(&DeviceConfig::default()).is_valid());
    }
}
