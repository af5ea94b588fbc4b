//! CLI module for ralphr - command-line interface.
//!
//! Provides the single-command argument surface: iteration count plus
//! flags for prompt file, verbosity, stop-on-complete behavior, activity
//! log location, and notifications.

pub mod commands;

pub use commands::Cli;
