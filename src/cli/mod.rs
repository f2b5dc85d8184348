//! CLI module for eventwatch - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for watching a JSON field,
//! waiting on an event status, and batch status lookups.

pub mod commands;

pub use commands::Cli;
