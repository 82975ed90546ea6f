//! Job worker
//!
//! The single consumer of the job queue. Each dequeued job runs through
//! the pipeline orchestrator; an uncaught failure is recorded as a
//! terminal `failed` state and never re-raised to the loop. Shutdown
//! cancels the pipeline in flight and exits the loop cleanly.

use crate::orchestrator::PipelineRunner;
use slated_core::JobStatus;
use slated_store::{JobQueueReceiver, JobStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Drain the queue until shutdown fires or every enqueuer is gone
pub async fn run_worker(
    mut queue: JobQueueReceiver,
    store: Arc<JobStore>,
    runner: Arc<PipelineRunner>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Job worker started");

    loop {
        let job_id = tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                info!("Job worker shutting down");
                return;
            }
            job = queue.dequeue() => match job {
                Some(job_id) => job_id,
                None => {
                    info!("Job queue closed, worker exiting");
                    return;
                }
            },
        };

        info!(job_id = %job_id, "Job dequeued");

        tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                // The dropped pipeline future aborts any in-flight call;
                // the job stays non-terminal.
                warn!(job_id = %job_id, "Shutdown cancelled the running pipeline");
                return;
            }
            result = runner.run_job(&job_id) => {
                if let Err(e) = result {
                    let message = e.to_string();
                    warn!(job_id = %job_id, "Job failed: {}", message);
                    let recorded = store
                        .update(&job_id, move |state| {
                            state.advance_status(JobStatus::Failed);
                            state.step = None;
                            state.error = Some(message);
                        })
                        .await;
                    if let Err(update_err) = recorded {
                        error!(job_id = %job_id, "Could not record failure: {}", update_err);
                    }
                }
            }
        }
    }
}
