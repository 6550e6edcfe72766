//! Console driver for a simulated panel.
//!
//! Reads one command per line and applies it to a [`SimulatedPanel`] or
//! the verdict's control surface:
//!
//! ```text
//! key 1234      tap each key in turn
//! unplug 2      pull wire 2          plug 2    put it back
//! toggle 0      flip switch 0
//! press         hold the button      release   let it go
//! pause         toggle pause         resume    clear pause
//! block toggle_bank
//! status        print the screen
//! quit
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::engine::StatusBoard;
use crate::phase::PhaseId;
use crate::phase::combination::is_keypad_key;
use crate::presentation;
use crate::verdict::Verdict;

use super::{SimulatedPanel, TOGGLE_LINES, WIRE_LINES};

/// Samples a tapped key is held for, and released for afterwards.
const TAP_SAMPLES: u32 = 3;

/// One console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Tap each key in order.
    Key(Vec<char>),
    /// Pull a wire.
    Unplug(u8),
    /// Reinsert a wire.
    Plug(u8),
    /// Flip a toggle.
    Toggle(u8),
    /// Hold the button.
    Press,
    /// Release the button.
    Release,
    /// Toggle pause.
    Pause,
    /// Clear pause.
    Resume,
    /// Ask a phase to force itself terminal.
    Block(PhaseId),
    /// Print the status screen.
    Status,
    /// Stop reading commands.
    Quit,
}

/// Why a console line was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line.
    #[error("empty command")]
    Empty,

    /// First word is not a command.
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// Command needs an argument.
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    /// Argument did not parse.
    #[error("invalid argument '{value}' for '{command}': {reason}")]
    InvalidArgument {
        /// Command name.
        command: &'static str,
        /// Raw argument.
        value: String,
        /// What was wrong with it.
        reason: String,
    },
}

fn index_arg(command: &'static str, arg: Option<&str>, count: u8) -> Result<u8, CommandError> {
    let value = arg.ok_or(CommandError::MissingArgument(command))?;
    match value.parse::<u8>() {
        Ok(i) if i < count => Ok(i),
        _ => Err(CommandError::InvalidArgument {
            command,
            value: value.to_string(),
            reason: format!("expected 0..{count}"),
        }),
    }
}

impl std::str::FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(CommandError::Empty)?;
        let arg = words.next();
        match command.to_ascii_lowercase().as_str() {
            "key" | "keys" => {
                let keys = arg.ok_or(CommandError::MissingArgument("key"))?;
                if let Some(bad) = keys.chars().find(|&c| !is_keypad_key(c)) {
                    return Err(CommandError::InvalidArgument {
                        command: "key",
                        value: keys.to_string(),
                        reason: format!("'{bad}' is not on the keypad"),
                    });
                }
                Ok(Self::Key(keys.chars().collect()))
            }
            "unplug" | "cut" => index_arg("unplug", arg, WIRE_LINES).map(Self::Unplug),
            "plug" => index_arg("plug", arg, WIRE_LINES).map(Self::Plug),
            "toggle" | "flip" => index_arg("toggle", arg, TOGGLE_LINES).map(Self::Toggle),
            "press" => Ok(Self::Press),
            "release" => Ok(Self::Release),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "block" => {
                let phase = arg.ok_or(CommandError::MissingArgument("block"))?;
                phase
                    .parse()
                    .map(Self::Block)
                    .map_err(|reason| CommandError::InvalidArgument {
                        command: "block",
                        value: phase.to_string(),
                        reason,
                    })
            }
            "status" => Ok(Self::Status),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// How [`run_console`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// A `quit` command.
    Quit,
    /// The input closed.
    Eof,
    /// The attempt ended.
    Finished,
}

/// What the console acts on.
#[derive(Debug, Clone)]
pub struct ConsoleContext {
    /// Panel to drive.
    pub panel: Arc<SimulatedPanel>,
    /// Verdict for pause, resume and block.
    pub verdict: Arc<Verdict>,
    /// Board for `status`.
    pub board: Arc<StatusBoard>,
    /// Input sampling interval; taps are timed from it.
    pub poll_interval: Duration,
}

impl ConsoleContext {
    async fn tap(&self, key: char) {
        let hold = self.poll_interval * TAP_SAMPLES;
        self.panel.hold_keys(&[key]);
        tokio::time::sleep(hold).await;
        self.panel.release_keys();
        tokio::time::sleep(hold).await;
    }

    /// Applies one command. Returns text to print, if any.
    pub async fn apply(&self, command: &ConsoleCommand) -> Option<String> {
        debug!(?command, "console command");
        match command {
            ConsoleCommand::Key(keys) => {
                for &key in keys {
                    if self.verdict.overall().is_terminal() {
                        break;
                    }
                    self.tap(key).await;
                }
            }
            ConsoleCommand::Unplug(i) => self.panel.unplug_wire(*i),
            ConsoleCommand::Plug(i) => self.panel.plug_wire(*i),
            ConsoleCommand::Toggle(i) => {
                let up = self.panel.flip_toggle(*i)?;
                return Some(format!("toggle {i} {}", if up { "up" } else { "down" }));
            }
            ConsoleCommand::Press => self.panel.press_button(),
            ConsoleCommand::Release => self.panel.release_button(),
            ConsoleCommand::Pause => {
                let paused = self.verdict.pause().paused;
                return Some(if paused { "paused" } else { "resumed" }.to_string());
            }
            ConsoleCommand::Resume => {
                self.verdict.resume();
            }
            ConsoleCommand::Block(phase) => {
                if !self.verdict.block(*phase) {
                    return Some(format!("{phase} cannot be blocked"));
                }
            }
            ConsoleCommand::Status => {
                return Some(presentation::render(
                    &self.board.snapshot(),
                    &self.verdict.snapshot(),
                ));
            }
            ConsoleCommand::Quit => {}
        }
        None
    }
}

/// Reads commands from `input` until `quit`, end of input, or the attempt
/// ending. Replies and errors go to `output`.
///
/// # Errors
///
/// Returns an I/O error if reading or writing fails.
pub async fn run_console<R, W>(
    input: R,
    mut output: W,
    ctx: &ConsoleContext,
) -> std::io::Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cancel = ctx.verdict.cancellation();
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(ConsoleExit::Finished),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(ConsoleExit::Eof);
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => {
                info!("console quit");
                return Ok(ConsoleExit::Quit);
            }
            Ok(command) => ctx.apply(&command).await,
            Err(e) => Some(format!("error: {e}")),
        };
        if let Some(reply) = reply {
            output.write_all(reply.as_bytes()).await?;
            if !reply.ends_with('\n') {
                output.write_all(b"\n").await?;
            }
            output.flush().await?;
        }
    }
}
