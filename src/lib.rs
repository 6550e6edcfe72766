//! `defuse` - concurrent phase engine for a timed puzzle device
//!
//! An attempt runs five independent phases (a countdown and four
//! puzzles) as tokio tasks over a shared [`Sensor`](sensor::Sensor). Each
//! phase reports to a single [`Verdict`](verdict::Verdict) that decides
//! whether the device is defused or explodes.

pub mod cli;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod observability;
pub mod phase;
pub mod presentation;
pub mod sensor;
pub mod verdict;
