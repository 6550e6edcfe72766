//! Configuration
//!
//! Loads and validates device configuration files and resolves them into
//! the fixed targets of one attempt.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
