//! Command-line interface components
//!
//! This module contains CLI-specific code for the att application, including
//! argument parsing, command handlers and batch progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{parse_remote_path, BulkFileArgs, Cli, Commands, GlobalArgs, SingleFileArgs};
pub use commands::{handle_bulk_file_copy, handle_check, handle_single_file_copy, RunContext};
pub use progress::{print_summary, BatchProgress};
