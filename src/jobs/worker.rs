use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;

use super::{Job, Pipeline};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is full")]
    Full,
    #[error("job worker has stopped")]
    Closed,
}

/// Sending half of the job queue. Enqueueing never waits: a full queue is
/// reported to the caller instead of stalling the request.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
}

impl JobQueue {
    pub fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let kind = job.kind();
        let record_id = job.record_id();
        self.sender.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;
        tracing::debug!(kind, record_id, "job enqueued");
        Ok(())
    }

    /// Queue with no dispatcher; the receiver sees exactly what was enqueued.
    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

/// Starts the dispatcher. Each job runs on its own task; at most
/// `concurrency` run at once. The returned handle resolves once every
/// `JobQueue` clone is dropped and in-flight jobs have finished.
pub fn spawn_worker(
    pipeline: Arc<Pipeline>,
    concurrency: usize,
    capacity: usize,
) -> (JobQueue, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));
    let concurrency = concurrency.max(1);
    let handle = tokio::spawn(async move {
        let permits = Arc::new(Semaphore::new(concurrency));
        tracing::info!(concurrency, "job worker started");
        while let Some(job) = receiver.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let _permit = permit;
                // Outcome is already logged and published by the pipeline.
                let _ = pipeline.run(&job).await;
            });
        }
        let _ = permits.acquire_many(concurrency as u32).await;
        tracing::info!("job worker stopped");
    });
    (JobQueue { sender }, handle)
}
