//! # Process Execution
//!
//! The single seam through which commands shell out to external tools.
//!
//! ## Contract
//!
//! - Execution is synchronous: [`ProcessRunner::run`] returns once the child exits.
//! - A nonzero exit is an error ([`ProcessError::NonZeroExit`]) unless
//!   [`RunOptions::allow_failure`] is set, in which case the caller inspects
//!   [`RunOutput::code`] and decides what it means.
//! - Output is streamed to the terminal unless [`RunOptions::capture`] is set.
//!
//! ## Key Types
//!
//! - [`ProcessRunner`] - Trait implemented by anything that can run a command line
//! - [`ShellRunner`] - Runs command lines through `sh -c`
//! - [`RunOptions`] / [`RunOutput`] - Per-call options and results

mod runner;

pub use runner::{quote, ProcessError, ProcessRunner, RunOptions, RunOutput, ShellRunner};

#[cfg(test)]
pub(crate) use runner::testing;
