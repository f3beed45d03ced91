use super::{BackgroundJob, Completed, Pipeline, to_record_value};
use crate::error::PipelineError;
use crate::image_processing::{self, PNG_CONTENT_TYPE};
use crate::providers::GenerationInput;

pub(super) async fn run(pipeline: &Pipeline, job: &BackgroundJob) -> Result<Completed, PipelineError> {
    let records = &pipeline.records;
    records.backgrounds.require_live(job.background_id).await?;
    records.users.require_live(job.user_id).await?;
    let image = records.images.require_live(job.image_id).await?;
    let source_url = image
        .image_url
        .ok_or_else(|| PipelineError::not_found("image url", job.image_id))?;

    let source = pipeline.fetcher.fetch(&source_url).await?;
    let input = GenerationInput::Background {
        image: source,
        gen_type: job.gen_type,
        output_w: job.output_w,
        output_h: job.output_h,
        concept_option: job.concept_option.clone(),
    };
    let client = pipeline.backgrounds.as_ref();
    let output = client.generate(&input).await?;
    let payload = pipeline.resolve_output(client, output).await?;
    let png = image_processing::transcode_to_png(&payload)?;

    let bucket = pipeline.buckets.media.as_str();
    let url = pipeline
        .publish(bucket, &job.artifact_key, &png, PNG_CONTENT_TYPE)
        .await?;

    let params = job.clone();
    let mut replaced = None;
    let updated = pipeline
        .commit(
            &records.backgrounds,
            job.background_id,
            bucket,
            &job.artifact_key,
            |record| {
                let previous = std::mem::replace(&mut record.artifact_key, params.artifact_key);
                if record.image_url.is_some() && previous != record.artifact_key {
                    replaced = Some(previous);
                }
                record.image_url = Some(url.clone());
                record.gen_type = params.gen_type;
                record.output_w = params.output_w;
                record.output_h = params.output_h;
                record.concept_option = params.concept_option;
                if params.regenerate {
                    record.recreated = true;
                }
            },
        )
        .await?;

    if let Some(previous) = replaced {
        pipeline.discard_replaced(bucket, &previous).await;
    }

    Ok(Completed {
        url,
        record: to_record_value(&updated)?,
    })
}
