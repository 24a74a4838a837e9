//! Shared work queue with a completion barrier.
//!
//! Real tasks and shutdown markers travel through the same FIFO. Every real task
//! raises the pending count on `enqueue` and lowers it on `mark_done`; the
//! dispatcher blocks in `wait_until_drained` until the count is back to zero.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use tracing::{error, trace};

use crate::error::AccountingError;

/// What a worker receives from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem<T> {
    Task(T),
    Shutdown,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<QueueItem<T>>,
    pending: usize,
    over_completed: usize,
}

/// Unbounded MPMC queue with exactly-once delivery and a pending-task counter
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    drained: Condvar,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                pending: 0,
                over_completed: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Append a real task. Never blocks.
    pub fn enqueue(&self, task: T) {
        let mut state = self.state.lock();
        state.items.push_back(QueueItem::Task(task));
        state.pending += 1;
        trace!(pending = state.pending, "Enqueued task");
        drop(state);
        self.available.notify_one();
    }

    /// Append a shutdown marker. Markers are not counted as pending work.
    pub fn enqueue_shutdown(&self) {
        let mut state = self.state.lock();
        state.items.push_back(QueueItem::Shutdown);
        drop(state);
        self.available.notify_one();
    }

    /// Block until an item is available and take it
    pub fn dequeue(&self) -> QueueItem<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return item;
            }
            self.available.wait(&mut state);
        }
    }

    /// Take an item if one is queued right now
    pub fn try_dequeue(&self) -> Option<QueueItem<T>> {
        self.state.lock().items.pop_front()
    }

    /// Record that one dequeued task has finished, successfully or not.
    ///
    /// Calling this more often than `enqueue` leaves the count at zero and
    /// is remembered so `verify_accounting` can report it.
    pub fn mark_done(&self) -> Result<(), AccountingError> {
        let mut state = self.state.lock();
        if state.pending == 0 {
            state.over_completed += 1;
            let over = state.over_completed;
            drop(state);
            error!(over, "mark_done called with no pending task");
            return Err(AccountingError::OverCompleted(over));
        }

        state.pending -= 1;
        if state.pending == 0 {
            drop(state);
            self.drained.notify_all();
        }
        Ok(())
    }

    /// Block until every enqueued task has been marked done.
    ///
    /// Only meaningful once all producers have finished enqueueing; a transient
    /// zero before that would release the caller early.
    pub fn wait_until_drained(&self) {
        let mut state = self.state.lock();
        while state.pending > 0 {
            self.drained.wait(&mut state);
        }
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }

    /// Items (tasks or markers) still waiting to be dequeued
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the queue is fully settled: nothing pending, nothing left over,
    /// and no surplus `mark_done` calls along the way.
    pub fn verify_accounting(&self) -> Result<(), AccountingError> {
        let state = self.state.lock();
        if state.over_completed > 0 {
            return Err(AccountingError::OverCompleted(state.over_completed));
        }
        if state.pending > 0 {
            return Err(AccountingError::PendingAfterDrain(state.pending));
        }
        if !state.items.is_empty() {
            return Err(AccountingError::UnconsumedItems(state.items.len()));
        }
        Ok(())
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Calls `mark_done` when dropped, so the task is accounted for on every exit
/// path out of processing, unwinding included.
#[must_use = "the task is marked done as soon as the guard is dropped"]
pub struct CompletionGuard<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<'a, T> CompletionGuard<'a, T> {
    pub fn new(queue: &'a WorkQueue<T>) -> Self {
        Self { queue }
    }
}

impl<T> Drop for CompletionGuard<'_, T> {
    fn drop(&mut self) {
        // Already logged by mark_done; verify_accounting surfaces it later
        let _ = self.queue.mark_done();
    }
}
