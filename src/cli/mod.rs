//! CLI module for vmforge.
//!
//! This module provides the command-line interface for checking and
//! running deployment plans.

mod commands;
mod output;

pub use commands::{Cli, Commands, EngineArgs, LogFormat, OutputFormat, ProviderArgs};
pub use output::OutputFormatter;
