//! Command-line argument parsing for Archive Transfer
//!
//! This module defines the CLI structure using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// att - move archival files from Dropbox to the NAS
#[derive(Parser, Debug)]
#[command(
    name = "att",
    version,
    about = "Move archival files from Dropbox to the NAS with checksum verification",
    long_about = "Copies files from the Dropbox intake folder into per-file folders on the NAS.
Each transferred file is verified against the Dropbox content hash and gets a SHA-256
manifest and a copy of the submission's default metadata next to it."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Log at debug level instead of info
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - only errors are logged
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Reuse a container folder that already exists on the NAS
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// Settings file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify Dropbox and NAS access
    Check,

    /// Copy a single file from Dropbox to the NAS
    ///
    /// The file ends up in its own folder on the NAS together with the default
    /// metadata file and a SHA-256 manifest.
    SingleFileCopy(SingleFileArgs),

    /// Copy every file listed in a CSV from Dropbox to the NAS
    ///
    /// After each file arrives, its metadata file is updated with the CSV columns and
    /// the transfer date.
    BulkFileCopy(BulkFileArgs),
}

/// Arguments for the single-file-copy command
#[derive(Args, Debug, Clone)]
pub struct SingleFileArgs {
    /// "subfolder/file name.ext" relative to the Dropbox folder
    #[arg(long, value_parser = parse_remote_path)]
    pub remote_file: String,
}

/// Arguments for the bulk-file-copy command
#[derive(Args, Debug, Clone)]
pub struct BulkFileArgs {
    /// "subfolder/list.csv" relative to the Dropbox folder
    #[arg(long, value_parser = parse_remote_path)]
    pub remote_csv: String,

    /// Number of files transferred at once (defaults to the settings file, then 1)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl BulkFileArgs {
    /// Check values clap cannot validate on its own
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        if !self.remote_csv.to_ascii_lowercase().ends_with(".csv") {
            return Err(format!("{} is not a .csv file", self.remote_csv));
        }
        Ok(())
    }
}

/// Validate the `"folder/file name.ext"` form of a remote path argument
///
/// Accepts an alphanumeric first character, a folder of at least two characters,
/// exactly one `/`, and a file name ending in an extension of 3 to 5 characters.
pub fn parse_remote_path(value: &str) -> Result<String, String> {
    const MESSAGE: &str = "Parameter not formatted as folder/file name.ext";

    let Some((folder, file_name)) = value.split_once('/') else {
        return Err(MESSAGE.to_string());
    };

    let starts_alphanumeric = folder
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_alphanumeric || folder.chars().count() < 2 || file_name.contains('/') {
        return Err(MESSAGE.to_string());
    }

    let has_extension = file_name.char_indices().any(|(index, c)| {
        index > 0 && c == '.' && (3..=5).contains(&file_name[index + 1..].chars().count())
    });
    if !has_extension {
        return Err(MESSAGE.to_string());
    }

    Ok(value.to_string())
}
