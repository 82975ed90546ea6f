//! # slated-store
//!
//! Durable job records and the in-process job queue.
//!
//! The job store keeps one directory per job (request, state, artifacts)
//! with per-job serialized mutations; the queue is an unbounded in-memory
//! FIFO with a single consumer.

mod job_store;
mod queue;

pub use job_store::{sniff_image_mime, JobStore};
pub use queue::{job_queue, JobQueue, JobQueueReceiver};
