//! CLI commands and argument parsing

use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Page-by-page export of paginated result sets
#[derive(Parser, Debug)]
#[command(name = "solidafy-pagestream")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Export configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export every record of the configured source
    Export {
        /// Output file (overrides the config; stdout when neither is set)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (overrides the config)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Run in parallel with this many workers (overrides the config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Show how the cursor would be split for a parallel export
    Plan,

    /// Validate the export configuration
    Validate,
}
