//! Bounded CPU offload pool
//!
//! Decode and encode work is CPU-bound and must not consume the worker
//! pool's network-wait concurrency or stall the writer's I/O progress. The
//! pool caps in-flight CPU tasks at a fixed number of slots, independent of
//! the fetch worker count: a semaphore permit is held for the lifetime of
//! each `spawn_blocking` task.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Fixed pool of execution slots for short CPU-bound tasks
///
/// `submit` suspends the caller while all slots are busy, so at most
/// `slots` tasks run (or wait to run) on the blocking thread pool at any
/// instant. Cloning is cheap; clones share the same slots.
#[derive(Clone)]
pub struct CpuPool {
    semaphore: Arc<Semaphore>,
    slots: usize,
}

impl CpuPool {
    /// Create a pool with the given number of execution slots
    pub fn new(slots: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(slots)),
            slots,
        }
    }

    /// Number of execution slots
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Submit a task, suspending until a slot is free
    ///
    /// The returned handle must be awaited via [`CpuTask::join`] to observe
    /// the task's value. The slot is released when the task finishes, not
    /// when the handle is joined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Task`] if the pool's semaphore has been closed
    /// (which the pipeline never does during a run).
    pub async fn submit<F, T>(&self, task: F) -> Result<CpuTask<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Task("offload pool is closed".to_string()))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        });

        Ok(CpuTask { handle })
    }

    /// Wait for all in-flight tasks to finish
    ///
    /// Acquires every slot, which only succeeds once no task holds a
    /// permit. The slots are released again on return, so the pool remains
    /// usable; the pipeline calls this exactly once at the end of a run.
    pub async fn close(&self) {
        match self.semaphore.acquire_many(self.slots as u32).await {
            Ok(_permits) => {}
            Err(_) => {
                // Semaphore closed elsewhere; nothing left to wait for
            }
        }
    }
}

/// Handle to a submitted CPU task
pub struct CpuTask<T> {
    handle: JoinHandle<T>,
}

impl<T> CpuTask<T> {
    /// Await the task's completion and return its value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Task`] if the task panicked. A task that returns a
    /// `Result` surfaces its own failure through the `Ok` value, for the
    /// caller to classify.
    pub async fn join(self) -> Result<T> {
        self.handle
            .await
            .map_err(|e| Error::Task(format!("offload task failed: {e}")))
    }
}
