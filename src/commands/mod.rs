//! CLI command implementations for restic-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Environment, configuration and repository validation
//! - `config`: Configuration file generation
//! - `test`: Scrape testing

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
