//! CLI module
//!
//! Command-line interface for running exports.
//!
//! # Commands
//!
//! - `export` - Export every record of the configured source
//! - `plan` - Show how the cursor splits into units
//! - `validate` - Validate the export configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::{build_plan, Runner};
