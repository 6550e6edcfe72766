//! `validate` command
//!
//! Loads each file through the same pipeline `run` uses and reports every
//! issue found, without resolving random targets or starting an attempt.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, DefuseError, ExitCode, Severity, ValidationIssue};

/// Validation outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<IssueReport>,
    warnings: Vec<IssueReport>,
}

#[derive(Debug, Serialize)]
struct IssueReport {
    path: String,
    message: String,
}

impl From<&ValidationIssue> for IssueReport {
    fn from(issue: &ValidationIssue) -> Self {
        Self {
            path: issue.path.clone(),
            message: issue.message.clone(),
        }
    }
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    tracing::info!(file = %path.display(), "validating configuration");
    let (errors, warnings) = match loader.load(path) {
        Ok(result) if strict => (result.warnings, Vec::new()),
        Ok(result) => (Vec::new(), result.warnings),
        Err(ConfigError::ValidationError { errors, .. }) => {
            errors
                .into_iter()
                .partition::<Vec<_>, _>(|issue| issue.severity == Severity::Error)
        }
        Err(e) => (
            vec![ValidationIssue {
                path: "<file>".to_string(),
                message: e.to_string(),
                severity: Severity::Error,
            }],
            Vec::new(),
        ),
    };
    FileReport {
        file: path.display().to_string(),
        valid: errors.is_empty(),
        errors: errors.iter().map(IssueReport::from).collect(),
        warnings: warnings.iter().map(IssueReport::from).collect(),
    }
}

/// Validate configuration files.
///
/// Returns `ExitCode::CONFIG_ERROR` if any file is invalid. With `--strict`
/// warnings count as errors.
///
/// # Errors
///
/// Returns a JSON error if the report cannot be serialized.
pub fn run(args: &ValidateArgs) -> Result<i32, DefuseError> {
    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| check(&loader, path, args.strict))
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                if report.valid {
                    println!("{}: ok", report.file);
                } else {
                    println!("{}: invalid", report.file);
                }
                for issue in &report.errors {
                    println!("  error: {} at {}", issue.message, issue.path);
                }
                for issue in &report.warnings {
                    println!("  warning: {} at {}", issue.message, issue.path);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    if reports.iter().all(|r| r.valid) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::CONFIG_ERROR)
    }
}
