//! Progress display for batch transfers
//!
//! A single indicatif bar advances once per row. It is hidden when stderr is not a
//! terminal or output is quiet, so logs stay clean when the tool runs unattended.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::app::batch::{BatchReport, RowOutcome};

/// Progress bar driven by batch row outcomes
#[derive(Debug)]
pub struct BatchProgress {
    bar: ProgressBar,
    failed: u64,
}

impl BatchProgress {
    /// Create a bar for `total` rows
    pub fn new(total: usize, enabled: bool) -> Self {
        let bar = ProgressBar::new(total as u64);
        if enabled && atty::is(atty::Stream::Stderr) {
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
            bar.set_style(style);
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar, failed: 0 }
    }

    /// Record one finished row
    pub fn observe(&mut self, outcome: &RowOutcome) {
        if !outcome.is_success() {
            self.failed += 1;
        }
        let file_name = outcome.layout.object_file_name();
        if self.failed > 0 {
            self.bar
                .set_message(format!("{} ({} failed)", file_name, self.failed));
        } else {
            self.bar.set_message(file_name.to_string());
        }
        self.bar.inc(1);
    }

    /// Rows observed so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Clear the bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Print the end-of-batch summary, listing every failed row
pub fn print_summary(report: &BatchReport) {
    println!(
        "Transferred {} of {} files ({} failed, {} with warnings)",
        report.success_count(),
        report.len(),
        report.failure_count(),
        report.warning_count()
    );
    for outcome in report.failures() {
        if let Some(error) = outcome.error() {
            println!(
                "  line {}: {}: {}",
                outcome.row.line, outcome.row.relative_path, error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::batch::BatchRow;
    use crate::app::layout::PathPlanner;
    use crate::errors::TransferError;

    fn failed_outcome() -> RowOutcome {
        let layout = PathPlanner::new("/root/", "/nas/").plan("folder/file.pdf");
        RowOutcome {
            index: 0,
            row: BatchRow::new("folder/file.pdf", Vec::new()),
            result: Err(TransferError::RemoteObjectMissing {
                path: layout.remote.full_path(),
            }),
            layout,
        }
    }

    #[test]
    fn test_progress_counts_rows() {
        let mut progress = BatchProgress::new(2, false);
        progress.observe(&failed_outcome());
        progress.observe(&failed_outcome());
        assert_eq!(progress.position(), 2);
        assert_eq!(progress.failed, 2);
        progress.finish();
    }
}
