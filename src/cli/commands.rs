//! Command handlers for the att CLI
//!
//! This module implements the command handlers that connect CLI arguments with the
//! transfer pipeline. Configuration is loaded once in `main` and passed in through
//! [`RunContext`].

use tracing::{debug, error, info, warn};

use crate::app::{BatchCoordinator, FileList, PathPlanner, Transfer};
use crate::auth::{connect, prompt_token, Session};
use crate::cli::progress::{print_summary, BatchProgress};
use crate::cli::{BulkFileArgs, SingleFileArgs};
use crate::config::{Config, Settings, Workspace};
use crate::errors::{AppError, Result};

/// Everything a command needs besides its own arguments
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Deployment configuration from the environment
    pub config: Config,
    /// Optional tuning from the settings file
    pub settings: Settings,
    /// Reuse existing container folders
    pub overwrite: bool,
    /// Suppress the progress bar
    pub quiet: bool,
}

impl RunContext {
    fn is_offline(&self) -> bool {
        self.config.workspace == Workspace::Test
    }

    fn planner(&self) -> PathPlanner {
        PathPlanner::from_config(&self.config)
    }

    async fn connect(&self) -> Result<Session> {
        debug!("Connecting to Dropbox ({} workspace)", self.config.workspace);
        Ok(connect(&self.config, &self.settings.client, prompt_token).await?)
    }
}

/// Handle the check command
///
/// Confirms that Dropbox accepts the access token and that the NAS folder is mounted.
pub async fn handle_check(ctx: &RunContext) -> Result<()> {
    if ctx.is_offline() {
        debug!("Test environment, do nothing.");
        return Ok(());
    }

    let session = ctx.connect().await?;
    match &session.account.team_name {
        Some(team) => info!(
            "SUCCESS: Connected to the {} Dropbox as {}",
            team, session.account.display_name
        ),
        None => info!(
            "SUCCESS: Connected to Dropbox as {}",
            session.account.display_name
        ),
    }

    let nas = &ctx.config.nas_folder;
    if tokio::fs::metadata(nas)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
    {
        info!("SUCCESS: NAS Folder is connected.");
        Ok(())
    } else {
        error!("ERROR: NAS Folder ({}) is not connected.", nas.display());
        Err(AppError::generic(format!(
            "NAS folder {} is not connected",
            nas.display()
        )))
    }
}

/// Handle the single-file-copy command
pub async fn handle_single_file_copy(args: SingleFileArgs, ctx: &RunContext) -> Result<()> {
    let transfer = Transfer::new(ctx.planner().plan(&args.remote_file));

    if ctx.is_offline() {
        transfer.ensure_container(ctx.overwrite).await?;
        debug!("No connection to Dropbox in the test workspace");
        return Ok(());
    }

    let session = ctx.connect().await?;
    let report = transfer.run(&session.client, ctx.overwrite).await?;

    let layout = transfer.layout();
    println!(
        "Transferred {} to {}",
        layout.remote.full_path(),
        layout.container_dir.display()
    );
    if let Err(e) = &report.manifest {
        warn!("{}", e);
        println!("  manifest not written: {}", e);
    }
    if let Err(e) = &report.sidecar {
        warn!("{}", e);
        println!("  metadata not copied: {}", e);
    }
    Ok(())
}

/// Handle the bulk-file-copy command
///
/// Every row is attempted; the command fails at the end if any row failed.
pub async fn handle_bulk_file_copy(args: BulkFileArgs, ctx: &RunContext) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    let file_list = FileList::new(ctx.config.remote_folder.clone(), args.remote_csv.clone());

    if ctx.is_offline() {
        info!(
            "Test workspace: not reading {} from Dropbox",
            file_list.remote_path()
        );
        return Ok(());
    }

    let session = ctx.connect().await?;
    let rows = file_list.load(&session.client).await?;
    if rows.is_empty() {
        warn!("{} lists no files", file_list.remote_path());
        return Ok(());
    }

    let concurrency = args.workers.unwrap_or(ctx.settings.batch.concurrency);
    let coordinator = BatchCoordinator::new(&session.client, ctx.planner(), ctx.overwrite)
        .with_concurrency(concurrency);

    let mut progress = BatchProgress::new(rows.len(), !ctx.quiet);
    let report = coordinator
        .run_with_observer(rows, |outcome| progress.observe(outcome))
        .await;
    progress.finish();

    print_summary(&report);
    if report.all_succeeded() {
        Ok(())
    } else {
        Err(AppError::generic(format!(
            "{} of {} files failed to transfer",
            report.failure_count(),
            report.len()
        )))
    }
}
