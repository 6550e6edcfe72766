//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler. Every
//! handler returns the process exit code on success.

pub mod run;
pub mod validate;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::{DefuseError, ExitCode};

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` fires on Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<i32, DefuseError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Validate(args) => validate::run(&args),
        Commands::Version(args) => {
            version::run(&args);
            Ok(ExitCode::SUCCESS)
        }
    }
}
