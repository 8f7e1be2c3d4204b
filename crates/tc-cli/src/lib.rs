//! Timeclock CLI library.
//!
//! This crate provides the CLI interface for timeclock.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, SettingsAction};
pub use config::Config;
