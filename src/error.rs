//! Error types for hevcify
//!
//! Three families, matching how far a failure is allowed to travel:
//! - `EnumerationError`: the input tree cannot be listed. Aborts the run before dispatch.
//! - `ProcessingError`: one task failed. Caught by the worker and recorded as an outcome.
//! - `AccountingError`: the queue bookkeeping is inconsistent. Always a bug, always fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce the task list
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("Input directory does not exist: {0:?}")]
    MissingRoot(PathBuf),

    #[error("Path is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("Failed to walk input tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to load ignore rules: {0}")]
    Ignore(String),
}

/// Failure of a single task. Never escapes the worker loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("failed to create output directory {path:?}: {reason}")]
    CreateDir { path: PathBuf, reason: String },

    #[error("ffprobe failed on {path:?}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("transcode of {path:?} failed: {reason}")]
    Transcode { path: PathBuf, reason: String },

    #[error("copy of {path:?} failed: {reason}")]
    Copy { path: PathBuf, reason: String },

    #[error("failed to commit {path:?}: {reason}")]
    Commit { path: PathBuf, reason: String },

    #[error("processing panicked: {0}")]
    Panicked(String),

    #[error("interrupted before processing started")]
    Interrupted,
}

/// Broken task accounting. Indicates a defect, not an environmental failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountingError {
    #[error("mark_done called {0} more time(s) than tasks were enqueued")]
    OverCompleted(usize),

    #[error("{0} task(s) still pending after workers terminated")]
    PendingAfterDrain(usize),

    #[error("{0} item(s) left in the queue after shutdown")]
    UnconsumedItems(usize),

    #[error("{0} terminated abnormally")]
    WorkerPanicked(String),
}

/// Errors that abort a dispatch run
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error("Accounting invariant violated: {0}")]
    Accounting(#[from] AccountingError),

    #[error("Could not start any worker thread: {0}")]
    NoWorkers(String),
}
