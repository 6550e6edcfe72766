//! Error types for `defuse`
//!
//! Only configuration problems and broken worker tasks are errors. Wrong
//! keys, wrong wires, exhausted strikes and expired time are ordinary game
//! outcomes and flow through the verdict instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::phase::PhaseId;
use crate::sensor::Line;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `defuse` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution (or a defused attempt)
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Engine error (a worker task died)
    pub const ENGINE_ERROR: i32 = 4;

    /// The attempt ended in an explosion
    pub const EXPLODED: i32 = 5;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `defuse` operations.
#[derive(Debug, Error)]
pub enum DefuseError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Phase engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DefuseError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Engine(_) => ExitCode::ENGINE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// All of these are fatal at startup: an attempt never starts with a
/// target it could not interpret.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file (or `<inline>`)
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration too large: {size} bytes (limit: {limit})")]
    TooLarge {
        /// Actual file size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "combination.target")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents the attempt from starting
    Error,
    /// Warning - suspicious but playable configuration
    Warning,
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Phase engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A phase worker task panicked or was aborted
    #[error("{phase} worker failed: {message}")]
    WorkerFailed {
        /// Phase the worker was driving
        phase: PhaseId,
        /// Join error description
        message: String,
    },

    /// A control task (pause key watcher) panicked or was aborted
    #[error("control task failed: {0}")]
    ControlFailed(String),
}

// ============================================================================
// Sensor Errors
// ============================================================================

/// Sensor read failures.
///
/// Workers treat every variant as "no change" for the current tick; these
/// never reach the verdict or the presentation layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SensorError {
    /// The requested line is not wired on this device
    #[error("line {0} is not available")]
    Unavailable(Line),

    /// Transient read fault
    #[error("sensor fault: {0}")]
    Fault(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `defuse` operations.
pub type Result<T> = std::result::Result<T, DefuseError>;

// ============================================================================
// Tests
// ============================================================================
