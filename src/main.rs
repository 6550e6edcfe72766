//! `defuse` - timed puzzle device simulator

use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use defuse::cli::args::Cli;
use defuse::cli::commands;
use defuse::error::ExitCode;
use defuse::observability::{LogFormat, init_logging};

/// Waits for Ctrl-C or SIGTERM and returns the matching exit code.
async fn shutdown_signal() -> i32 {
    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return ExitCode::INTERRUPTED;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
        _ = sigterm.recv() => ExitCode::TERMINATED,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(LogFormat::Human, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();

    // Spawn signal handler for graceful shutdown
    let token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();

        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");

        std::process::exit(shutdown_signal().await);
    });

    match commands::dispatch(cli, cancel).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
