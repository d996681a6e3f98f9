//! CLI module for normdb
//!
//! Provides command-line interface for:
//! - check: Validate a schema and print its structure
//! - apply: Apply JSON operations from stdin to a state and print the result

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{apply, apply_lines, check, describe, load_state, open_database, run, run_command, OpKind, Operation};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_operations, write_error, write_response};
