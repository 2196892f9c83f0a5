//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the
//! serialist binary. Handlers write their report to any [`std::io::Write`].

mod arc;
mod check;
mod commands;
mod config;
mod inspect;

pub use arc::{handle_arc, render_arc};
pub use check::{check_chapter, handle_check};
pub use commands::{Cli, Commands};
pub use config::handle_config;
pub use inspect::{InspectReport, handle_inspect, inspect_project};

/// Result type for command handlers.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;
