//! Worker loop: dequeue, process, account, repeat until a shutdown marker.

use indicatif::ProgressBar;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

use crate::error::ProcessingError;
use crate::job::TaskItem;
use crate::queue::{CompletionGuard, QueueItem, WorkQueue};

/// Identity of a worker within one run, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// What the processing capability did with a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    /// Re-encoded to the target codec
    Converted,
    /// Duplicated verbatim
    Copied,
    /// Output already present, nothing written
    Skipped,
}

/// Final status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStatus {
    Converted,
    Copied,
    Skipped,
    Failed,
}

impl From<Disposition> for TaskStatus {
    fn from(disposition: Disposition) -> Self {
        match disposition {
            Disposition::Converted => TaskStatus::Converted,
            Disposition::Copied => TaskStatus::Copied,
            Disposition::Skipped => TaskStatus::Skipped,
        }
    }
}

/// Result of one processing attempt
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: TaskItem,
    pub status: TaskStatus,
    pub worker: WorkerId,
    pub error: Option<String>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// The per-task capability invoked by workers.
///
/// Implementations may be slow and may fail or panic; the worker contains all of it.
pub trait TaskProcessor: Send + Sync {
    fn process(&self, task: &TaskItem) -> Result<Disposition, ProcessingError>;
}

impl<F> TaskProcessor for F
where
    F: Fn(&TaskItem) -> Result<Disposition, ProcessingError> + Send + Sync,
{
    fn process(&self, task: &TaskItem) -> Result<Disposition, ProcessingError> {
        self(task)
    }
}

/// Cooperative stop request, checked by workers between tasks
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single consumer bound to the shared queue
pub struct Worker<P: ?Sized> {
    id: WorkerId,
    queue: Arc<WorkQueue<TaskItem>>,
    processor: Arc<P>,
    stop: StopSignal,
    progress: Option<ProgressBar>,
}

impl<P: TaskProcessor + ?Sized> Worker<P> {
    pub fn new(id: WorkerId, queue: Arc<WorkQueue<TaskItem>>, processor: Arc<P>) -> Self {
        Self {
            id,
            queue,
            processor,
            stop: StopSignal::new(),
            progress: None,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run until a shutdown marker is dequeued, returning every outcome produced
    pub fn run(self) -> Vec<TaskOutcome> {
        let span = info_span!("worker", id = %self.id);
        let _enter = span.enter();
        debug!("Worker started");

        let mut outcomes = Vec::new();
        loop {
            match self.queue.dequeue() {
                QueueItem::Shutdown => break,
                QueueItem::Task(task) => {
                    let outcome = {
                        let _done = CompletionGuard::new(&*self.queue);
                        self.handle(task)
                    };
                    if let Some(progress) = &self.progress {
                        progress.inc(1);
                    }
                    outcomes.push(outcome);
                }
            }
        }

        debug!(processed = outcomes.len(), "Worker received shutdown marker");
        outcomes
    }

    fn handle(&self, task: TaskItem) -> TaskOutcome {
        let started = Instant::now();

        let result = if self.stop.is_requested() {
            Err(ProcessingError::Interrupted)
        } else {
            info!("➡️ Processing: {}", task.display_name());
            panic::catch_unwind(AssertUnwindSafe(|| self.processor.process(&task)))
                .unwrap_or_else(|payload| Err(ProcessingError::Panicked(panic_message(&*payload))))
        };

        let elapsed = started.elapsed();
        match result {
            Ok(disposition) => {
                match disposition {
                    Disposition::Converted => info!("✅ Converted: {:?}", task.output_path()),
                    Disposition::Copied => info!("📁 Copied: {:?}", task.output_path()),
                    Disposition::Skipped => {
                        info!("⏭️ Output already exists, skipping: {:?}", task.output_path())
                    }
                }
                TaskOutcome {
                    task,
                    status: disposition.into(),
                    worker: self.id,
                    error: None,
                    elapsed,
                }
            }
            Err(e) => {
                if matches!(e, ProcessingError::Interrupted) {
                    warn!("Stop requested, not processing: {}", task.display_name());
                } else {
                    error!("❌ FAILED {}: {}", task.display_name(), e);
                }
                TaskOutcome {
                    task,
                    status: TaskStatus::Failed,
                    worker: self.id,
                    error: Some(e.to_string()),
                    elapsed,
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
