//! Orchestrates a run: enumerate, fill the queue, start the pool, wait for the
//! completion barrier, send one shutdown marker per worker, join.

use indicatif::ProgressBar;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{AccountingError, DispatchError, EnumerationError};
use crate::job::TaskItem;
use crate::queue::WorkQueue;
use crate::worker::{StopSignal, TaskOutcome, TaskProcessor, Worker, WorkerId};

/// Produces the complete task set before dispatch starts
pub trait TaskSource {
    fn enumerate(&self) -> Result<Vec<TaskItem>, EnumerationError>;
}

impl TaskSource for Vec<TaskItem> {
    fn enumerate(&self) -> Result<Vec<TaskItem>, EnumerationError> {
        Ok(self.clone())
    }
}

/// Lifecycle of a dispatch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DispatchState {
    Idle,
    Enumerating,
    Dispatching,
    Draining,
    ShuttingDown,
    Terminated,
}

/// Everything a finished run hands to reporting
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub outcomes: Vec<TaskOutcome>,
    pub tasks_enqueued: usize,
    pub workers_started: usize,
    pub shutdown_markers_sent: usize,
    /// States visited, in order, starting at `Idle`
    pub transitions: Vec<DispatchState>,
    pub elapsed: Duration,
}

impl DispatchReport {
    pub fn final_state(&self) -> DispatchState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(DispatchState::Idle)
    }
}

/// Drives the worker pool over one task set
pub struct Dispatcher<S, P> {
    source: S,
    processor: Arc<P>,
    workers: NonZeroUsize,
    stop: StopSignal,
    progress: Option<ProgressBar>,
}

impl<S, P> Dispatcher<S, P>
where
    S: TaskSource,
    P: TaskProcessor + 'static,
{
    pub fn new(source: S, processor: P, workers: NonZeroUsize) -> Self {
        Self {
            source,
            processor: Arc::new(processor),
            workers,
            stop: StopSignal::new(),
            progress: None,
        }
    }

    /// Share a stop signal with the caller; workers stop picking up new tasks once it fires
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Progress bar advanced once per finished task; its length is set after enumeration
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn run(&self) -> Result<DispatchReport, DispatchError> {
        let started = Instant::now();
        let mut lifecycle = Lifecycle::new();

        lifecycle.advance(DispatchState::Enumerating);
        let tasks = self.source.enumerate()?;

        if tasks.is_empty() {
            info!("No files found in the input directory. Nothing to do.");
            lifecycle.advance(DispatchState::Terminated);
            if let Some(progress) = &self.progress {
                progress.finish_and_clear();
            }
            return Ok(DispatchReport {
                outcomes: Vec::new(),
                tasks_enqueued: 0,
                workers_started: 0,
                shutdown_markers_sent: 0,
                transitions: lifecycle.into_states(),
                elapsed: started.elapsed(),
            });
        }

        lifecycle.advance(DispatchState::Dispatching);
        let queue = Arc::new(WorkQueue::new());
        let tasks_enqueued = tasks.len();
        for task in tasks {
            queue.enqueue(task);
        }
        if let Some(progress) = &self.progress {
            progress.set_length(tasks_enqueued as u64);
        }
        info!(
            "Queued {} tasks. Starting {} workers...",
            tasks_enqueued, self.workers
        );

        let handles = self.spawn_workers(&queue)?;
        let workers_started = handles.len();

        lifecycle.advance(DispatchState::Draining);
        queue.wait_until_drained();
        debug!("All {} tasks accounted for", tasks_enqueued);

        lifecycle.advance(DispatchState::ShuttingDown);
        for _ in 0..workers_started {
            queue.enqueue_shutdown();
        }

        let mut outcomes = Vec::with_capacity(tasks_enqueued);
        let mut lost_worker = None;
        for (id, handle) in handles {
            match handle.join() {
                Ok(worker_outcomes) => outcomes.extend(worker_outcomes),
                Err(_) => {
                    warn!("{} terminated abnormally", id);
                    lost_worker.get_or_insert(id);
                }
            }
        }
        if let Some(id) = lost_worker {
            return Err(AccountingError::WorkerPanicked(id.to_string()).into());
        }
        queue.verify_accounting()?;

        lifecycle.advance(DispatchState::Terminated);
        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        Ok(DispatchReport {
            outcomes,
            tasks_enqueued,
            workers_started,
            shutdown_markers_sent: workers_started,
            transitions: lifecycle.into_states(),
            elapsed: started.elapsed(),
        })
    }

    /// Start the pool. A partially started pool keeps running; only a pool
    /// with no workers at all is an error.
    fn spawn_workers(
        &self,
        queue: &Arc<WorkQueue<TaskItem>>,
    ) -> Result<Vec<(WorkerId, JoinHandle<Vec<TaskOutcome>>)>, DispatchError> {
        let mut handles = Vec::with_capacity(self.workers.get());
        let mut last_error = None;

        for n in 1..=self.workers.get() {
            let id = WorkerId(n);
            let mut worker = Worker::new(id, Arc::clone(queue), Arc::clone(&self.processor))
                .with_stop_signal(self.stop.clone());
            if let Some(progress) = &self.progress {
                worker = worker.with_progress(progress.clone());
            }

            match thread::Builder::new()
                .name(id.to_string())
                .spawn(move || worker.run())
            {
                Ok(handle) => handles.push((id, handle)),
                Err(e) => {
                    warn!("Failed to start {}: {}", id, e);
                    last_error = Some(e);
                }
            }
        }

        if handles.is_empty() {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no workers configured".to_string());
            return Err(DispatchError::NoWorkers(reason));
        }
        Ok(handles)
    }
}

/// Records the state machine so callers and tests can see the path taken
struct Lifecycle {
    states: Vec<DispatchState>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            states: vec![DispatchState::Idle],
        }
    }

    fn advance(&mut self, next: DispatchState) {
        debug!("Dispatcher state: {:?} -> {:?}", self.current(), next);
        self.states.push(next);
    }

    fn current(&self) -> DispatchState {
        self.states.last().copied().unwrap_or(DispatchState::Idle)
    }

    fn into_states(self) -> Vec<DispatchState> {
        self.states
    }
}
