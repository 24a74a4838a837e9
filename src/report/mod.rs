use serde::Serialize;
use std::path::PathBuf;

use crate::dispatcher::DispatchReport;
use crate::worker::{TaskOutcome, TaskStatus, WorkerId};

/// One failed task in the summary
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailureRecord {
    pub source: PathBuf,
    pub worker: WorkerId,
    pub cause: String,
}

/// Aggregated outcome of a run
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Summary {
    pub converted: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub workers: usize,
    pub elapsed_seconds: f64,
    pub failures: Vec<FailureRecord>,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.converted + self.copied + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Folds task outcomes into a [`Summary`]. Used once, after all workers joined.
#[derive(Debug, Default)]
pub struct ResultReporter {
    summary: Summary,
}

impl ResultReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_report(report: &DispatchReport) -> Self {
        let mut reporter = Self::new();
        reporter.record_all(&report.outcomes);
        reporter.summary.workers = report.workers_started;
        reporter.summary.elapsed_seconds = report.elapsed.as_secs_f64();
        reporter
    }

    pub fn record(&mut self, outcome: &TaskOutcome) {
        match outcome.status {
            TaskStatus::Converted => self.summary.converted += 1,
            TaskStatus::Copied => self.summary.copied += 1,
            TaskStatus::Skipped => self.summary.skipped += 1,
            TaskStatus::Failed => {
                self.summary.failed += 1;
                self.summary.failures.push(FailureRecord {
                    source: outcome.task.source_path().to_path_buf(),
                    worker: outcome.worker,
                    cause: outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        }
    }

    pub fn record_all<'a>(&mut self, outcomes: impl IntoIterator<Item = &'a TaskOutcome>) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    /// Finished summary, failures ordered by source path
    pub fn summary(&self) -> Summary {
        let mut summary = self.summary.clone();
        summary.failures.sort_by(|a, b| a.source.cmp(&b.source));
        summary
    }
}

/// Human-readable summary text
pub fn render(summary: &Summary) -> String {
    let mut out = String::new();
    out.push_str("\n📊 Transcode Summary\n");
    out.push_str("═══════════════════\n");
    out.push_str(&format!("Converted: {}\n", summary.converted));
    out.push_str(&format!("Copied:    {}\n", summary.copied));
    out.push_str(&format!("Skipped:   {}\n", summary.skipped));
    out.push_str(&format!("Failed:    {}\n", summary.failed));
    out.push_str(&format!(
        "Total:     {} files with {} workers in {:.1}s\n",
        summary.total(),
        summary.workers,
        summary.elapsed_seconds
    ));

    if summary.has_failures() {
        out.push_str("\n❌ Failures:\n");
        for failure in &summary.failures {
            out.push_str(&format!(
                "  • {} [{}]\n    {}\n",
                failure.source.display(),
                failure.worker,
                failure.cause
            ));
        }
    } else {
        out.push_str("\n✅ Operation completed for all files.\n");
    }
    out
}
