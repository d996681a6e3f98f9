//! CLI argument definitions using clap
//!
//! Commands:
//! - normdb check --schema <path>
//! - normdb apply --schema <path> [--state <path>] [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// normdb - normalized relational state store
#[derive(Parser, Debug)]
#[command(name = "normdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log filter (e.g. `debug`, `normdb=trace`); falls back to RUST_LOG,
    /// then `warn`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a schema and print its tables, keys and relations
    Check {
        /// Path to the schema JSON file
        #[arg(long)]
        schema: PathBuf,

        /// Path to a store configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Apply newline-delimited operations from stdin in one session
    Apply {
        /// Path to the schema JSON file
        #[arg(long)]
        schema: PathBuf,

        /// Starting state; every table empty if omitted
        #[arg(long)]
        state: Option<PathBuf>,

        /// Path to a store configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
