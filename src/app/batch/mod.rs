//! Batch transfers driven by a file list
//!
//! [`BatchCoordinator`] runs the per-object pipeline for every row, then merges the
//! row's metadata fields and the transfer date into the object's metadata sidecar.
//! A failed row is recorded and the batch moves on; the [`BatchReport`] lists every
//! outcome in row order.
//!
//! Rows are processed one at a time by default. With a concurrency above one,
//! several rows are in flight at once, but rows that plan to the same container are
//! serialized so their phases never interleave.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::app::layout::{LocalLayout, PathPlanner};
use crate::app::remote::RemoteStore;
use crate::app::transfer::{ObjectReport, Transfer};
use crate::constants::{batch, metadata};
use crate::errors::{ArtifactError, ArtifactResult, TransferError};

pub mod rows;

pub use rows::{BatchRow, FileList};

/// A transferred row
#[derive(Debug)]
pub struct RowSuccess {
    /// Per-object pipeline report
    pub report: ObjectReport,
    /// Outcome of merging the row's fields into the metadata sidecar
    pub metadata: ArtifactResult<()>,
}

/// Result of processing one row
#[derive(Debug)]
pub struct RowOutcome {
    /// Position of the row in the batch (0-based)
    pub index: usize,
    /// The row as read
    pub row: BatchRow,
    /// Planned local layout
    pub layout: LocalLayout,
    /// Transfer outcome
    pub result: Result<RowSuccess, TransferError>,
}

impl RowOutcome {
    /// Whether the object was transferred and verified
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The terminal failure, if any
    pub fn error(&self) -> Option<&TransferError> {
        self.result.as_ref().err()
    }

    /// Whether the object arrived but a manifest, sidecar or merge step failed
    pub fn has_warnings(&self) -> bool {
        match &self.result {
            Ok(success) => !success.report.is_complete() || success.metadata.is_err(),
            Err(_) => false,
        }
    }
}

/// Outcomes of a whole batch, in row order
#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<RowOutcome>,
}

impl BatchReport {
    /// All row outcomes
    pub fn outcomes(&self) -> &[RowOutcome] {
        &self.outcomes
    }

    /// Rows whose object was not transferred
    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    /// Rows whose object was transferred
    pub fn successes(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_success())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Transferred rows with at least one best-effort failure
    pub fn warning_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.has_warnings()).count()
    }

    /// Whether every row was transferred
    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Runs the per-object pipeline over a list of rows
#[derive(Debug)]
pub struct BatchCoordinator<'a, S> {
    store: &'a S,
    planner: PathPlanner,
    overwrite: bool,
    concurrency: usize,
    container_locks: StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl<'a, S: RemoteStore> BatchCoordinator<'a, S> {
    /// Create a sequential coordinator
    pub fn new(store: &'a S, planner: PathPlanner, overwrite: bool) -> Self {
        Self {
            store,
            planner,
            overwrite,
            concurrency: batch::DEFAULT_CONCURRENCY,
            container_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Allow up to `concurrency` rows in flight (clamped to the supported range)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, batch::MAX_CONCURRENCY);
        self
    }

    /// Rows processed at once
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process every row and collect the outcomes
    pub async fn run(&self, rows: Vec<BatchRow>) -> BatchReport {
        self.run_with_observer(rows, |_| {}).await
    }

    /// Process every row, calling `observer` as each outcome becomes available
    ///
    /// Outcomes are observed and reported in row order.
    pub async fn run_with_observer<F>(&self, rows: Vec<BatchRow>, mut observer: F) -> BatchReport
    where
        F: FnMut(&RowOutcome),
    {
        info!(
            "Starting batch of {} rows ({} at a time)",
            rows.len(),
            self.concurrency
        );

        let mut outcomes = Vec::with_capacity(rows.len());
        let mut results = stream::iter(rows.into_iter().enumerate())
            .map(|(index, row)| self.process_row(index, row))
            .buffered(self.concurrency);

        while let Some(outcome) = results.next().await {
            observer(&outcome);
            outcomes.push(outcome);
        }

        let report = BatchReport { outcomes };
        info!(
            "Batch finished: {} transferred, {} failed, {} with warnings",
            report.success_count(),
            report.failure_count(),
            report.warning_count()
        );
        report
    }

    async fn process_row(&self, index: usize, row: BatchRow) -> RowOutcome {
        let layout = self.planner.plan(&row.relative_path);
        let lock = self.container_lock(&layout.container_dir);
        let _guard = lock.lock().await;

        debug!("Row {}: {}", index + 1, row.relative_path);
        let transfer = Transfer::new(layout.clone());
        let result = match transfer.run(self.store, self.overwrite).await {
            Ok(report) => {
                let metadata = merge_metadata(
                    &layout.metadata_path,
                    &row.fields,
                    &report.record.remote_modified,
                )
                .await;
                Ok(RowSuccess { report, metadata })
            }
            Err(e) => {
                error!(
                    "Row {} ({}) failed: {} [{}]",
                    index + 1,
                    row.relative_path,
                    e,
                    e.kind()
                );
                Err(e)
            }
        };

        RowOutcome {
            index,
            row,
            layout,
            result,
        }
    }

    fn container_lock(&self, container: &Path) -> Arc<Mutex<()>> {
        let mut locks = self
            .container_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(container.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Merge row fields and the transfer date into the metadata sidecar at `path`
///
/// Existing keys keep their position; new keys are appended in field order with
/// `Transfer Date` last. The file is rewritten with four-space indentation. A
/// missing sidecar yields a new object holding only the merged fields.
pub async fn merge_metadata(
    path: &Path,
    fields: &[(String, String)],
    transfer_date: &str,
) -> ArtifactResult<()> {
    let merge_error = |reason: String| {
        warn!("Failed to merge metadata into {}: {}", path.display(), reason);
        ArtifactError::MetadataMerge {
            path: path.to_path_buf(),
            reason,
        }
    };

    let mut object = match tokio::fs::read(path).await {
        Ok(content) => match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(merge_error("sidecar is not a JSON object".to_string())),
            Err(e) => return Err(merge_error(e.to_string())),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No sidecar at {}, creating one", path.display());
            Map::new()
        }
        Err(e) => return Err(merge_error(e.to_string())),
    };

    for (key, value) in fields {
        object.insert(key.clone(), Value::String(value.clone()));
    }
    object.insert(
        metadata::TRANSFER_DATE.to_string(),
        Value::String(transfer_date.to_string()),
    );

    let rendered = to_indented_json(&Value::Object(object)).map_err(|e| merge_error(e.to_string()))?;
    tokio::fs::write(path, rendered)
        .await
        .map_err(|e| merge_error(e.to_string()))?;

    debug!("Merged {} fields into {}", fields.len() + 1, path.display());
    Ok(())
}

fn to_indented_json(value: &Value) -> serde_json::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(metadata::JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}
