//! Submission and lookup operations shared by the REST and MCP surfaces.
//!
//! Input is validated before anything is written. A submission creates the
//! pending record with its reserved artifact key, clears the stale status
//! entry and enqueues the job. Nothing here waits on generation.

use std::ops::RangeInclusive;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::image_processing;
use crate::jobs::{
    BackgroundJob, Job, JobQueue, Pipeline, QueueError, ResizeJob, TextVideoJob, VideoJob,
};
use crate::records::{
    Background, GenType, HasArtifact, ImageResizing, JsonTable, Record, RecordError, Records,
    SourceImage, TextVideo, User, Video,
};
use crate::status::StatusEntry;
use crate::storage::{StorageError, get_extension_from_mime_type, upload_key};

const DEFAULT_OUTPUT_SIZE: u32 = 1000;
const OUTPUT_SIZE_RANGE: RangeInclusive<u32> = 200..=2000;
const RESIZE_RANGE: RangeInclusive<u32> = 1..=4096;
const MAX_PROMPT_CHARS: usize = 255;
const MAX_NICKNAME_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("service unavailable: {0}")]
    Unavailable(#[from] QueueError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound { table, id } => ApiError::NotFound { entity: table, id },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub nickname: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterImageRequest {
    pub user_id: u64,
    pub image_url: String,
}

/// A multipart upload after the form has been read.
#[derive(Debug, Clone)]
pub struct Upload {
    pub user_id: u64,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BackgroundRequest {
    #[schemars(description = "Requesting user id")]
    pub user_id: u64,
    #[schemars(description = "Source image id (upload or registered URL)")]
    pub image_id: u64,
    #[schemars(description = "One of remove_bg, color_bg, simple, concept")]
    pub gen_type: String,
    #[schemars(description = "Output width in pixels, 200-2000, default 1000")]
    pub output_w: Option<u32>,
    #[schemars(description = "Output height in pixels, 200-2000, default 1000")]
    pub output_h: Option<u32>,
    #[schemars(description = "Generation options as a JSON object, default {}")]
    pub concept_option: Option<Value>,
}

/// Parameters to change when a background is generated again. Omitted
/// fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegenerateRequest {
    pub gen_type: Option<String>,
    pub output_w: Option<u32>,
    pub output_h: Option<u32>,
    pub concept_option: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoRequest {
    pub user_id: u64,
    pub background_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextVideoRequest {
    pub user_id: u64,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResizeRequest {
    pub user_id: u64,
    pub background_id: u64,
    pub width: u32,
    pub height: u32,
}

pub struct MediaService {
    pipeline: Arc<Pipeline>,
    queue: JobQueue,
}

impl MediaService {
    pub fn new(pipeline: Arc<Pipeline>, queue: JobQueue) -> Self {
        Self { pipeline, queue }
    }

    fn records(&self) -> &Records {
        &self.pipeline.records
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, ApiError> {
        let nickname = request.nickname.trim().to_string();
        if nickname.is_empty() || nickname.chars().count() > MAX_NICKNAME_CHARS {
            return Err(ApiError::BadRequest(format!(
                "nickname must be 1-{MAX_NICKNAME_CHARS} characters"
            )));
        }
        let user = self
            .records()
            .users
            .insert(|id, now| User::new(id, nickname, now))
            .await?;
        tracing::info!(user_id = user.id, "user created");
        Ok(user)
    }

    pub async fn upload_image(&self, upload: Upload) -> Result<SourceImage, ApiError> {
        if upload.bytes.is_empty() {
            return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
        }
        if let Some(content_type) = upload.content_type.as_deref() {
            if !content_type.starts_with("image/") {
                return Err(ApiError::BadRequest(format!(
                    "unsupported file type: {content_type}"
                )));
            }
        }
        self.records().users.require_live(upload.user_id).await?;
        let mime_type = image_processing::detect_mime_type(&upload.bytes).ok_or_else(|| {
            ApiError::BadRequest("uploaded file is not a supported image".to_string())
        })?;

        let key = upload_key(&upload.bytes, get_extension_from_mime_type(mime_type));
        let url = self
            .pipeline
            .store
            .put(&self.pipeline.buckets.media, &key, &upload.bytes, mime_type)
            .await?;
        let image = self
            .records()
            .images
            .insert(|id, now| SourceImage {
                id,
                user_id: upload.user_id,
                image_url: Some(url),
                artifact_key: Some(key),
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await?;
        tracing::info!(image_id = image.id, size = upload.bytes.len(), "image uploaded");
        Ok(image)
    }

    pub async fn register_image(
        &self,
        request: RegisterImageRequest,
    ) -> Result<SourceImage, ApiError> {
        let url = validate_http_url(&request.image_url)?;
        self.records().users.require_live(request.user_id).await?;
        let image = self
            .records()
            .images
            .insert(|id, now| SourceImage {
                id,
                user_id: request.user_id,
                image_url: Some(url.to_string()),
                artifact_key: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await?;
        Ok(image)
    }

    pub async fn get_image(&self, id: u64) -> Result<SourceImage, ApiError> {
        Ok(self.records().images.require_live(id).await?)
    }

    pub async fn submit_background(
        &self,
        request: BackgroundRequest,
    ) -> Result<Background, ApiError> {
        let gen_type = parse_gen_type(&request.gen_type)?;
        let output_w = output_size("output_w", request.output_w)?;
        let output_h = output_size("output_h", request.output_h)?;
        let concept_option = concept_option(request.concept_option)?;
        let records = self.records();
        records.users.require_live(request.user_id).await?;
        records.images.require_live(request.image_id).await?;

        let artifact_key = format!("{}.png", Uuid::new_v4());
        let background = records
            .backgrounds
            .insert(|id, now| Background {
                id,
                user_id: request.user_id,
                image_id: request.image_id,
                gen_type,
                concept_option: concept_option.clone(),
                output_w,
                output_h,
                artifact_key: artifact_key.clone(),
                image_url: None,
                recreated: false,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await?;

        let job = Job::GenerateBackground(BackgroundJob {
            background_id: background.id,
            user_id: background.user_id,
            image_id: background.image_id,
            gen_type,
            output_w,
            output_h,
            concept_option,
            artifact_key,
            regenerate: false,
        });
        self.enqueue_new(&records.backgrounds, job).await?;
        Ok(background)
    }

    /// Generates an existing background again under a fresh artifact key. The
    /// record keeps its id and is left as is until the job succeeds, which
    /// then writes the new parameters together with the new URL.
    pub async fn regenerate_background(
        &self,
        id: u64,
        request: RegenerateRequest,
    ) -> Result<Background, ApiError> {
        let records = self.records();
        let current = records.backgrounds.require_live(id).await?;
        let gen_type = match request.gen_type.as_deref() {
            Some(raw) => parse_gen_type(raw)?,
            None => current.gen_type,
        };
        let output_w = output_size("output_w", request.output_w.or(Some(current.output_w)))?;
        let output_h = output_size("output_h", request.output_h.or(Some(current.output_h)))?;
        let concept_option = match request.concept_option {
            Some(value) => concept_option(Some(value))?,
            None => current.concept_option.clone(),
        };
        records.users.require_live(current.user_id).await?;
        records.images.require_live(current.image_id).await?;

        let job = Job::GenerateBackground(BackgroundJob {
            background_id: id,
            user_id: current.user_id,
            image_id: current.image_id,
            gen_type,
            output_w,
            output_h,
            concept_option,
            artifact_key: format!("{}.png", Uuid::new_v4()),
            regenerate: true,
        });
        self.enqueue(job).await?;
        tracing::info!(background_id = id, "background regeneration queued");
        Ok(current)
    }

    pub async fn get_background(&self, id: u64) -> Result<Background, ApiError> {
        Ok(self.records().backgrounds.require_live(id).await?)
    }

    pub async fn delete_background(&self, id: u64) -> Result<(), ApiError> {
        let bucket = &self.pipeline.buckets.media;
        self.delete_generated(&self.records().backgrounds, bucket, id)
            .await
    }

    pub async fn submit_video(&self, request: VideoRequest) -> Result<Video, ApiError> {
        let records = self.records();
        records.users.require_live(request.user_id).await?;
        let background = self.finished_background(request.background_id).await?;

        let artifact_key = format!("videos/{}.mp4", Uuid::new_v4());
        let video = records
            .videos
            .insert(|id, now| Video {
                id,
                user_id: request.user_id,
                background_id: background.id,
                artifact_key: artifact_key.clone(),
                video_url: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await?;

        let job = Job::ImageToVideo(VideoJob {
            video_id: video.id,
            background_id: background.id,
            artifact_key,
        });
        self.enqueue_new(&records.videos, job).await?;
        Ok(video)
    }

    pub async fn get_video(&self, id: u64) -> Result<Video, ApiError> {
        Ok(self.records().videos.require_live(id).await?)
    }

    pub async fn delete_video(&self, id: u64) -> Result<(), ApiError> {
        let bucket = &self.pipeline.buckets.video;
        self.delete_generated(&self.records().videos, bucket, id).await
    }

    pub async fn submit_text_video(
        &self,
        request: TextVideoRequest,
    ) -> Result<TextVideo, ApiError> {
        let prompt = request.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(ApiError::BadRequest(format!(
                "prompt must be at most {MAX_PROMPT_CHARS} characters"
            )));
        }
        let records = self.records();
        records.users.require_live(request.user_id).await?;

        let artifact_key = format!("text-videos/{}.mp4", Uuid::new_v4());
        let text_video = records
            .text_videos
            .insert(|id, now| TextVideo {
                id,
                user_id: request.user_id,
                prompt: prompt.clone(),
                translated_prompt: None,
                artifact_key: artifact_key.clone(),
                video_url: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await?;

        let job = Job::TextToVideo(TextVideoJob {
            text_video_id: text_video.id,
            user_id: request.user_id,
            prompt,
            artifact_key,
        });
        self.enqueue_new(&records.text_videos, job).await?;
        Ok(text_video)
    }

    pub async fn get_text_video(&self, id: u64) -> Result<TextVideo, ApiError> {
        Ok(self.records().text_videos.require_live(id).await?)
    }

    pub async fn delete_text_video(&self, id: u64) -> Result<(), ApiError> {
        let bucket = &self.pipeline.buckets.video;
        self.delete_generated(&self.records().text_videos, bucket, id)
            .await
    }

    pub async fn submit_resize(&self, request: ResizeRequest) -> Result<ImageResizing, ApiError> {
        for (field, value) in [("width", request.width), ("height", request.height)] {
            if !RESIZE_RANGE.contains(&value) {
                return Err(ApiError::BadRequest(format!(
                    "{field} must be between {} and {}",
                    RESIZE_RANGE.start(),
                    RESIZE_RANGE.end()
                )));
            }
        }
        let records = self.records();
        records.users.require_live(request.user_id).await?;
        let background = self.finished_background(request.background_id).await?;

        let artifact_key = format!("resized/{}.png", Uuid::new_v4());
        let resizing = records
            .resizings
            .insert(|id, now| ImageResizing {
                id,
                user_id: request.user_id,
                background_id: background.id,
                width: request.width,
                height: request.height,
                artifact_key: artifact_key.clone(),
                image_url: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await?;

        let job = Job::ResizeImage(ResizeJob {
            resizing_id: resizing.id,
            background_id: background.id,
            width: request.width,
            height: request.height,
            artifact_key,
        });
        self.enqueue_new(&records.resizings, job).await?;
        Ok(resizing)
    }

    pub async fn get_resize(&self, id: u64) -> Result<ImageResizing, ApiError> {
        Ok(self.records().resizings.require_live(id).await?)
    }

    pub async fn delete_resize(&self, id: u64) -> Result<(), ApiError> {
        let bucket = &self.pipeline.buckets.media;
        self.delete_generated(&self.records().resizings, bucket, id)
            .await
    }

    pub async fn status(&self, key: &str) -> Option<StatusEntry> {
        self.pipeline.status.get(key).await
    }

    async fn finished_background(&self, id: u64) -> Result<Background, ApiError> {
        let background = self.records().backgrounds.require_live(id).await?;
        if background.image_url.is_none() {
            return Err(ApiError::Conflict(format!(
                "background {id} has not finished generating"
            )));
        }
        Ok(background)
    }

    async fn enqueue(&self, job: Job) -> Result<(), ApiError> {
        self.pipeline.status.delete(&job.status_key()).await;
        self.queue.enqueue(job)?;
        Ok(())
    }

    /// Enqueues the first job of a freshly created record. A record whose job
    /// was never accepted is deleted again.
    async fn enqueue_new<T: Record>(&self, table: &JsonTable<T>, job: Job) -> Result<(), ApiError> {
        let id = job.record_id();
        if let Err(err) = self.enqueue(job).await {
            tracing::warn!(table = T::TABLE, id, error = %err, "job rejected, discarding record");
            if let Err(cleanup) = table.soft_delete(id).await {
                tracing::error!(table = T::TABLE, id, error = %cleanup, "failed to discard record");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Deletes the stored artifact of a completed record, then the record. A
    /// storage failure keeps the record so the delete can be retried.
    async fn delete_generated<T: Record + HasArtifact>(
        &self,
        table: &JsonTable<T>,
        bucket: &str,
        id: u64,
    ) -> Result<(), ApiError> {
        let record = table.require_live(id).await?;
        if record.artifact_url().is_some() {
            let key = record.artifact_key();
            match self.pipeline.store.delete(bucket, key).await {
                Ok(()) => {}
                Err(StorageError::NotFound { .. }) => {
                    tracing::warn!(bucket, key, "stored artifact already missing");
                }
                Err(err) => {
                    tracing::error!(table = T::TABLE, id, bucket, key, error = %err, "artifact delete failed");
                    return Err(err.into());
                }
            }
        }
        table.soft_delete(id).await?;
        tracing::info!(table = T::TABLE, id, "record deleted");
        Ok(())
    }
}

fn parse_gen_type(raw: &str) -> Result<GenType, ApiError> {
    raw.trim().parse().map_err(ApiError::BadRequest)
}

fn output_size(field: &str, value: Option<u32>) -> Result<u32, ApiError> {
    let value = value.unwrap_or(DEFAULT_OUTPUT_SIZE);
    if OUTPUT_SIZE_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!(
            "{field} must be between {} and {}",
            OUTPUT_SIZE_RANGE.start(),
            OUTPUT_SIZE_RANGE.end()
        )))
    }
}

/// Normalizes generation options to a serialized JSON object. A string is
/// accepted when it holds a JSON object.
fn concept_option(value: Option<Value>) -> Result<String, ApiError> {
    let value = match value {
        None | Some(Value::Null) => return Ok("{}".to_string()),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(&raw).map_err(|err| {
            ApiError::BadRequest(format!("concept_option is not valid JSON: {err}"))
        })?,
        Some(other) => other,
    };
    if !value.is_object() {
        return Err(ApiError::BadRequest(
            "concept_option must be a JSON object".to_string(),
        ));
    }
    Ok(value.to_string())
}

fn validate_http_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("image_url must not be empty".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| ApiError::BadRequest(format!("image_url is not a valid URL: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ApiError::BadRequest(format!(
            "image_url must use http or https, got {scheme}"
        ))),
    }
}
