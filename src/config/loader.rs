//! Configuration loader
//!
//! Loading pipeline:
//! 1. Size check against [`ConfigLimits`]
//! 2. YAML parsing into [`DeviceConfig`]
//! 3. Validation, collecting every issue
//!
//! Resolving random targets is a separate step
//! ([`AttemptConfig::resolve`](crate::config::AttemptConfig::resolve)) so a
//! loaded file can be replayed into any number of attempts.

use std::path::{Path, PathBuf};

use crate::config::schema::DeviceConfig;
use crate::config::validation::Validator;
use crate::error::{ConfigError, ValidationIssue};

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Size limits.
    pub config_limits: ConfigLimits,
}

/// Limits that guard against pathological input.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("DEFUSE_MAX_CONFIG_SIZE", 64 * 1024),
        }
    }
}

/// A loaded and validated configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The configuration document.
    pub config: DeviceConfig,
    /// Warnings from validation.
    pub warnings: Vec<ValidationIssue>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - It exceeds the size limit
    /// - YAML parsing fails
    /// - Validation finds errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let limit = self.options.config_limits.max_config_size;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > limit {
            return Err(ConfigError::TooLarge { size, limit });
        }

        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        Self::parse(&content, path)
    }

    /// Loads and validates configuration text. `origin` names it in errors.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus file access.
    pub fn load_str(&self, content: &str, origin: &str) -> Result<LoadResult, ConfigError> {
        let limit = self.options.config_limits.max_config_size;
        if content.len() > limit {
            return Err(ConfigError::TooLarge {
                size: content.len(),
                limit,
            });
        }
        Self::parse(content, Path::new(origin))
    }

    fn parse(content: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        // an empty file means "all defaults"
        let config: DeviceConfig = if content.trim().is_empty() {
            DeviceConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: PathBuf::from(path),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        Ok(LoadResult {
            config,
            warnings: result.warnings,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
