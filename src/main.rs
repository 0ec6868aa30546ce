//! Archive Transfer CLI application
//!
//! Command-line interface for moving archival files from Dropbox to the NAS.

use std::process;

use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use archive_transfer::cli::{
    handle_bulk_file_copy, handle_check, handle_single_file_copy, Cli, Commands, RunContext,
};
use archive_transfer::config::{Config, Settings};
use archive_transfer::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Missing .env is fine, the variables may come from the environment
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("Archive Transfer v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let settings = Settings::load(cli.global.config.as_deref()).await?;
    debug!("Workspace: {}", config.workspace);

    let ctx = RunContext {
        config,
        settings,
        overwrite: cli.global.overwrite,
        quiet: cli.global.quiet,
    };

    match cli.command {
        Commands::Check => {
            info!("Executing check command");
            handle_check(&ctx).await
        }
        Commands::SingleFileCopy(args) => {
            info!("Executing single-file-copy command");
            handle_single_file_copy(args, &ctx).await
        }
        Commands::BulkFileCopy(args) => {
            info!("Executing bulk-file-copy command");
            handle_bulk_file_copy(args, &ctx).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("archive_transfer={}", log_level).parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.verbose)
        .init();

    if cli.global.verbose {
        debug!("Verbose logging enabled");
    }
}
