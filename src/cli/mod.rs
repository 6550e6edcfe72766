//! Command-line interface
//!
//! Argument definitions live in [`args`]; [`commands`] routes them to
//! handlers.

pub mod args;
pub mod commands;
