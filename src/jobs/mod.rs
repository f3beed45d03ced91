//! Background generation jobs.
//!
//! A job carries everything it needs (record primary key, reserved artifact
//! key, generation parameters) so it runs independently of the request that
//! queued it. [`Pipeline::run`] is the job boundary: every failure is logged,
//! published to the status channel and returned as a typed error.

mod background;
mod resize;
mod text_video;
mod video;
pub mod worker;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::poller::{PollOutcome, Attempt, poll};
use crate::providers::{
    GenerationClient, GenerationOutput, JobHandle, MediaFetcher, RemoteJobState, Translator,
};
use crate::records::{GenType, JsonTable, Record, RecordError, Records};
use crate::status::{self, StatusChannel, StatusEntry};
use crate::storage::{ObjectStore, StorageError};

pub use worker::{JobQueue, QueueError, spawn_worker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub background_id: u64,
    pub user_id: u64,
    pub image_id: u64,
    pub gen_type: GenType,
    pub output_w: u32,
    pub output_h: u32,
    pub concept_option: String,
    pub artifact_key: String,
    /// Set when an existing record is generated again.
    pub regenerate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    pub video_id: u64,
    pub background_id: u64,
    pub artifact_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextVideoJob {
    pub text_video_id: u64,
    pub user_id: u64,
    pub prompt: String,
    pub artifact_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeJob {
    pub resizing_id: u64,
    pub background_id: u64,
    pub width: u32,
    pub height: u32,
    pub artifact_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    GenerateBackground(BackgroundJob),
    ImageToVideo(VideoJob),
    TextToVideo(TextVideoJob),
    ResizeImage(ResizeJob),
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::GenerateBackground(_) => "generate_background",
            Job::ImageToVideo(_) => "image_to_video",
            Job::TextToVideo(_) => "text_to_video",
            Job::ResizeImage(_) => "resize_image",
        }
    }

    pub fn record_id(&self) -> u64 {
        match self {
            Job::GenerateBackground(job) => job.background_id,
            Job::ImageToVideo(job) => job.video_id,
            Job::TextToVideo(job) => job.text_video_id,
            Job::ResizeImage(job) => job.resizing_id,
        }
    }

    /// Status channel key, derived from the identity of the source media.
    pub fn status_key(&self) -> String {
        match self {
            Job::GenerateBackground(job) => status::background_key(job.image_id),
            Job::ImageToVideo(job) => status::video_key(job.background_id),
            Job::TextToVideo(job) => status::text_video_key(job.text_video_id),
            Job::ResizeImage(job) => status::resized_image_key(job.background_id),
        }
    }
}

/// Successful end state of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub url: String,
    pub record: serde_json::Value,
}

pub type JobResult = Result<Completed, PipelineError>;

#[derive(Debug, Clone)]
pub struct Buckets {
    pub media: String,
    pub video: String,
}

/// Clients a job needs, injected at construction.
pub struct Pipeline {
    pub records: Arc<Records>,
    pub store: Arc<dyn ObjectStore>,
    pub status: Arc<dyn StatusChannel>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub backgrounds: Arc<dyn GenerationClient>,
    pub image_video: Arc<dyn GenerationClient>,
    pub text_video: Arc<dyn GenerationClient>,
    pub translator: Arc<dyn Translator>,
    pub buckets: Buckets,
    pub policy: PipelineConfig,
}

impl Pipeline {
    pub async fn run(&self, job: &Job) -> JobResult {
        let key = job.status_key();
        tracing::info!(kind = job.kind(), record_id = job.record_id(), "job started");
        let result = match job {
            Job::GenerateBackground(job) => background::run(self, job).await,
            Job::ImageToVideo(job) => video::run(self, job).await,
            Job::TextToVideo(job) => text_video::run(self, job).await,
            Job::ResizeImage(job) => resize::run(self, job).await,
        };
        match &result {
            Ok(done) => {
                tracing::info!(
                    kind = job.kind(),
                    record_id = job.record_id(),
                    url = %done.url,
                    "job completed"
                );
                self.status
                    .set(&key, StatusEntry::Ready { url: done.url.clone() })
                    .await;
            }
            Err(err) => {
                tracing::error!(
                    kind = job.kind(),
                    record_id = job.record_id(),
                    error_kind = err.kind(),
                    error = %err,
                    "job failed"
                );
                self.status
                    .set(&key, StatusEntry::Failed { error: err.to_string() })
                    .await;
            }
        }
        result
    }

    /// Turns whatever the generation service returned into media bytes,
    /// waiting on queued jobs when necessary.
    async fn resolve_output(
        &self,
        client: &dyn GenerationClient,
        output: GenerationOutput,
    ) -> Result<Vec<u8>, PipelineError> {
        match output {
            GenerationOutput::Inline(bytes) => Ok(bytes),
            GenerationOutput::ResultUrl(url) => self.fetcher.fetch(&url).await,
            GenerationOutput::Handle(handle) => {
                let url = self.wait_for_job(client, &handle).await?;
                self.fetcher.fetch(&url).await
            }
        }
    }

    async fn wait_for_job(
        &self,
        client: &dyn GenerationClient,
        handle: &JobHandle,
    ) -> Result<String, PipelineError> {
        let outcome = poll(self.policy.remote_job, |attempt| async move {
            match client.job_status(handle).await? {
                RemoteJobState::Completed { url } => Ok(Attempt::Ready(url)),
                RemoteJobState::Pending { status } => {
                    tracing::debug!(request_id = %handle.request_id, attempt, %status, "remote job pending");
                    Ok(Attempt::Pending)
                }
                RemoteJobState::Failed { reason } => Err(PipelineError::Upstream {
                    service: client.service(),
                    status: None,
                    body: reason,
                }),
            }
        })
        .await?;
        match outcome {
            PollOutcome::Ready(url) => Ok(url),
            PollOutcome::TimedOut { attempts } => Err(PipelineError::AvailabilityTimeout {
                url: handle.status_url.clone(),
                attempts,
            }),
        }
    }

    /// Uploads `data` under the reserved key and waits until its public URL
    /// answers. An upload that never becomes reachable is removed again.
    async fn publish(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, PipelineError> {
        let url = self.store.put(bucket, key, data, content_type).await?;
        let fetcher = &self.fetcher;
        let outcome: Result<_, PipelineError> =
            poll(self.policy.availability, |attempt| {
                let url = url.as_str();
                async move {
                    if fetcher.is_available(url).await {
                        Ok(Attempt::Ready(()))
                    } else {
                        tracing::debug!(url, attempt, "artifact not reachable yet");
                        Ok(Attempt::Pending)
                    }
                }
            })
            .await;
        match outcome? {
            PollOutcome::Ready(()) => Ok(url),
            PollOutcome::TimedOut { attempts } => {
                if let Err(err) = self.store.delete(bucket, key).await {
                    tracing::warn!(bucket, key, error = %err, "failed to remove unreachable artifact");
                }
                Err(PipelineError::AvailabilityTimeout { url, attempts })
            }
        }
    }

    /// Writes a job's outcome onto its record. When the record was deleted
    /// while the job ran, the artifact published under `key` is removed.
    async fn commit<T: Record>(
        &self,
        table: &JsonTable<T>,
        id: u64,
        bucket: &str,
        key: &str,
        change: impl FnOnce(&mut T),
    ) -> Result<T, PipelineError> {
        match table.update(id, change).await {
            Ok(record) => Ok(record),
            Err(err) => {
                tracing::warn!(table = T::TABLE, id, bucket, key, error = %err, "record gone, removing artifact");
                if let Err(delete_err) = self.store.delete(bucket, key).await {
                    tracing::warn!(bucket, key, error = %delete_err, "failed to remove orphaned artifact");
                }
                Err(err.into())
            }
        }
    }

    /// Best-effort removal of an artifact that a newer one replaced.
    async fn discard_replaced(&self, bucket: &str, key: &str) {
        match self.store.delete(bucket, key).await {
            Ok(()) => tracing::debug!(bucket, key, "removed replaced artifact"),
            Err(err) => tracing::warn!(bucket, key, error = %err, "failed to remove replaced artifact"),
        }
    }
}

impl From<RecordError> for PipelineError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound { table, id } => PipelineError::NotFound { entity: table, id },
            other => PipelineError::Storage(StorageError::Io(std::io::Error::other(
                other.to_string(),
            ))),
        }
    }
}

fn to_record_value<T: Serialize>(record: &T) -> Result<serde_json::Value, PipelineError> {
    serde_json::to_value(record).map_err(|err| {
        PipelineError::Storage(StorageError::Io(std::io::Error::other(err.to_string())))
    })
}

#[cfg(test)]
pub(crate) mod testing;
