use super::{Completed, Pipeline, ResizeJob, to_record_value};
use crate::error::PipelineError;
use crate::image_processing::{self, PNG_CONTENT_TYPE};

pub(super) async fn run(pipeline: &Pipeline, job: &ResizeJob) -> Result<Completed, PipelineError> {
    let records = &pipeline.records;
    records.resizings.require_live(job.resizing_id).await?;
    let background = records.backgrounds.require_live(job.background_id).await?;
    let source_url = background
        .image_url
        .ok_or_else(|| PipelineError::not_found("background image", job.background_id))?;

    let source = pipeline.fetcher.fetch(&source_url).await?;
    let png = image_processing::resize_to_png(&source, job.width, job.height)?;

    let bucket = pipeline.buckets.media.as_str();
    let url = pipeline
        .publish(bucket, &job.artifact_key, &png, PNG_CONTENT_TYPE)
        .await?;

    let stored_url = url.clone();
    let updated = pipeline
        .commit(&records.resizings, job.resizing_id, bucket, &job.artifact_key, move |record| {
            record.image_url = Some(stored_url)
        })
        .await?;

    Ok(Completed {
        url,
        record: to_record_value(&updated)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::image_processing::tests::sample_png;
    use crate::jobs::Job;
    use crate::jobs::testing::{Clients, Harness};
    use crate::records::ImageResizing;
    use crate::status::{StatusChannel, StatusEntry, resized_image_key};
    use crate::storage::memory::MemoryObjectStore;

    const BACKGROUND_URL: &str = "https://cdn.example.com/bg.png";

    #[tokio::test]
    async fn resizes_the_finished_background() {
        let harness = Harness::new().await;
        let user = harness.seed_user().await;
        let image = harness.seed_image(user.id).await;
        let background = harness
            .seed_background(user.id, image.id, Some(BACKGROUND_URL))
            .await;
        harness.fetcher.serve(BACKGROUND_URL, sample_png(40, 40));
        let resizing = harness
            .records
            .resizings
            .insert(|id, now| ImageResizing {
                id,
                user_id: user.id,
                background_id: background.id,
                width: 16,
                height: 9,
                artifact_key: "resized/r.png".to_string(),
                image_url: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await
            .unwrap();
        let pipeline = harness.pipeline(Clients::default());

        let done = pipeline
            .run(&Job::ResizeImage(ResizeJob {
                resizing_id: resizing.id,
                background_id: background.id,
                width: 16,
                height: 9,
                artifact_key: resizing.artifact_key.clone(),
            }))
            .await
            .unwrap();

        let (bytes, _) = harness.store.object("media", "resized/r.png").unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 9));
        assert_eq!(done.record["image_url"], done.url.as_str());
    }

    #[tokio::test]
    async fn storage_failure_leaves_the_record_pending() {
        let harness = Harness::new().await;
        let user = harness.seed_user().await;
        let image = harness.seed_image(user.id).await;
        let background = harness
            .seed_background(user.id, image.id, Some(BACKGROUND_URL))
            .await;
        harness.fetcher.serve(BACKGROUND_URL, sample_png(8, 8));
        let resizing = harness
            .records
            .resizings
            .insert(|id, now| ImageResizing {
                id,
                user_id: user.id,
                background_id: background.id,
                width: 4,
                height: 4,
                artifact_key: "resized/f.png".to_string(),
                image_url: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await
            .unwrap();
        let pipeline = harness.pipeline_with_store(
            Clients::default(),
            Arc::new(MemoryObjectStore::failing()),
        );

        let err = pipeline
            .run(&Job::ResizeImage(ResizeJob {
                resizing_id: resizing.id,
                background_id: background.id,
                width: 4,
                height: 4,
                artifact_key: resizing.artifact_key.clone(),
            }))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "storage_failure");
        assert_eq!(harness.fetcher.availability_checks(), 0);
        let stored = harness.records.resizings.get(resizing.id).await.unwrap().unwrap();
        assert!(stored.image_url.is_none());
        assert!(matches!(
            harness.status.get(&resized_image_key(background.id)).await,
            Some(StatusEntry::Failed { .. })
        ));
    }
}
