use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::api::models::PipelineJob;
use crate::api::processor::process_request;
use crate::services::Services;

/// Starts worker tasks to process jobs from the queue
///
/// Each worker pulls jobs from the shared queue and runs them through the
/// pipeline. Workers exit once the queue is closed and drained.
///
/// # Arguments
/// * `job_rx` - Job receiver shared by all workers
/// * `services` - Shared pipeline services
/// * `workers` - Number of worker tasks to spawn
pub fn start_workers(
    job_rx: mpsc::Receiver<PipelineJob>,
    services: Arc<Services>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    // Wrap the job receiver in a mutex so multiple workers can access it
    let job_rx = Arc::new(Mutex::new(job_rx));

    info!("Spawning {} workers", workers);
    (0..workers)
        .map(|worker_id| {
            let services = services.clone();
            let job_rx = job_rx.clone();

            tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                loop {
                    trace!("Worker {} waiting for job", worker_id);
                    let job_opt = { job_rx.lock().await.recv().await };

                    match job_opt {
                        Some(job) => {
                            debug!(
                                "Worker {} processing request from {}",
                                worker_id, job.request.requester_email
                            );
                            let result = process_request(job.request, &services).await;

                            match &result {
                                Ok(_) => debug!("Worker {} completed job", worker_id),
                                Err(e) => warn!("Worker {} job failed: {}", worker_id, e),
                            }

                            if job.response_tx.send(result).is_err() {
                                warn!("Worker {} failed to send response - receiver dropped", worker_id);
                            }
                        }
                        None => {
                            info!("Worker {} shutting down - channel closed", worker_id);
                            break;
                        }
                    }
                }
            })
        })
        .collect()
}
