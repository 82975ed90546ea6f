//! In-process job queue
//!
//! Unbounded FIFO of job ids. Enqueue never blocks; the single consumer
//! dequeues asynchronously and observes channel close as end of work.
//! Ordering is first-in-first-out per enqueuer; ordering between
//! concurrent enqueuers is unspecified.

use slated_core::{Result, SlatedError};
use tokio::sync::mpsc;

/// Enqueue half, cloneable into every admission path
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl JobQueue {
    /// Enqueue a job id. Only fails when the worker is gone.
    pub fn enqueue(&self, job_id: impl Into<String>) -> Result<()> {
        self.tx
            .send(job_id.into())
            .map_err(|_| SlatedError::Other("job queue is closed".to_string()))
    }
}

/// Dequeue half, held by exactly one worker
pub struct JobQueueReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl JobQueueReceiver {
    /// Next job id, or `None` when every enqueuer is gone.
    ///
    /// Cancel-safe: dropping the future leaves the queue intact.
    pub async fn dequeue(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Create a connected queue pair
pub fn job_queue() -> (JobQueue, JobQueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobQueue { tx }, JobQueueReceiver { rx })
}
