use super::{Completed, Pipeline, VideoJob, to_record_value};
use crate::error::PipelineError;
use crate::image_processing::MP4_CONTENT_TYPE;
use crate::providers::GenerationInput;

pub(super) async fn run(pipeline: &Pipeline, job: &VideoJob) -> Result<Completed, PipelineError> {
    let records = &pipeline.records;
    records.videos.require_live(job.video_id).await?;
    let background = records.backgrounds.require_live(job.background_id).await?;
    let image_url = background
        .image_url
        .ok_or_else(|| PipelineError::not_found("background image", job.background_id))?;

    let client = pipeline.image_video.as_ref();
    let output = client
        .generate(&GenerationInput::ImageToVideo { image_url })
        .await?;
    let video = pipeline.resolve_output(client, output).await?;

    let bucket = pipeline.buckets.video.as_str();
    let url = pipeline
        .publish(bucket, &job.artifact_key, &video, MP4_CONTENT_TYPE)
        .await?;

    let stored_url = url.clone();
    let updated = pipeline
        .commit(&records.videos, job.video_id, bucket, &job.artifact_key, move |record| {
            record.video_url = Some(stored_url)
        })
        .await?;

    Ok(Completed {
        url,
        record: to_record_value(&updated)?,
    })
}
