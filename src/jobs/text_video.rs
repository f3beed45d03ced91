use super::{Completed, Pipeline, TextVideoJob, to_record_value};
use crate::error::PipelineError;
use crate::image_processing::MP4_CONTENT_TYPE;
use crate::providers::{GenerationInput, is_korean};

pub(super) async fn run(pipeline: &Pipeline, job: &TextVideoJob) -> Result<Completed, PipelineError> {
    let records = &pipeline.records;
    records.text_videos.require_live(job.text_video_id).await?;
    records.users.require_live(job.user_id).await?;

    let translated = if is_korean(&job.prompt) {
        let english = pipeline.translator.translate_to_english(&job.prompt).await?;
        tracing::debug!(text_video_id = job.text_video_id, %english, "prompt translated");
        Some(english)
    } else {
        None
    };
    let prompt = translated.clone().unwrap_or_else(|| job.prompt.clone());

    let client = pipeline.text_video.as_ref();
    let output = client.generate(&GenerationInput::TextToVideo { prompt }).await?;
    let video = pipeline.resolve_output(client, output).await?;

    let bucket = pipeline.buckets.video.as_str();
    let url = pipeline
        .publish(bucket, &job.artifact_key, &video, MP4_CONTENT_TYPE)
        .await?;

    let stored_url = url.clone();
    let updated = pipeline
        .commit(
            &records.text_videos,
            job.text_video_id,
            bucket,
            &job.artifact_key,
            move |record| {
                record.video_url = Some(stored_url);
                record.translated_prompt = translated;
            },
        )
        .await?;

    Ok(Completed {
        url,
        record: to_record_value(&updated)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::jobs::Job;
    use crate::jobs::testing::{Clients, Harness};
    use crate::providers::{
        GenerationOutput, JobHandle, MockGenerationClient, MockTranslator, RemoteJobState,
    };
    use crate::records::TextVideo;
    use crate::status::{StatusChannel, StatusEntry, text_video_key};

    const RESULT_URL: &str = "https://fal.example.com/files/out.mp4";

    fn handle() -> JobHandle {
        JobHandle {
            request_id: "req-1".to_string(),
            status_url: "https://queue.example.com/req-1/status".to_string(),
            response_url: "https://queue.example.com/req-1".to_string(),
        }
    }

    async fn seed(harness: &Harness, prompt: &str) -> (u64, TextVideo) {
        let user = harness.seed_user().await;
        let prompt = prompt.to_string();
        let record = harness
            .records
            .text_videos
            .insert(|id, now| TextVideo {
                id,
                user_id: user.id,
                prompt,
                translated_prompt: None,
                artifact_key: "text-videos/clip.mp4".to_string(),
                video_url: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await
            .unwrap();
        (user.id, record)
    }

    fn job(user_id: u64, record: &TextVideo) -> Job {
        Job::TextToVideo(TextVideoJob {
            text_video_id: record.id,
            user_id,
            prompt: record.prompt.clone(),
            artifact_key: record.artifact_key.clone(),
        })
    }

    #[tokio::test]
    async fn korean_prompts_are_translated_and_the_handle_is_polled() {
        let harness = Harness::new().await;
        let (user_id, record) = seed(&harness, "이륙하려는 로켓").await;
        harness.fetcher.serve(RESULT_URL, b"mp4".to_vec());

        let mut translator = MockTranslator::new();
        translator
            .expect_translate_to_english()
            .withf(|text| text == "이륙하려는 로켓")
            .times(1)
            .returning(|_| Ok("A rocket about to take off".to_string()));

        let polls = Arc::new(AtomicU32::new(0));
        let seen = polls.clone();
        let mut client = MockGenerationClient::new();
        client
            .expect_generate()
            .withf(|input| {
                matches!(input, GenerationInput::TextToVideo { prompt } if prompt == "A rocket about to take off")
            })
            .times(1)
            .returning(|_| Ok(GenerationOutput::Handle(handle())));
        client.expect_job_status().times(3).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(RemoteJobState::Pending {
                    status: "IN_PROGRESS".to_string(),
                })
            } else {
                Ok(RemoteJobState::Completed {
                    url: RESULT_URL.to_string(),
                })
            }
        });

        let pipeline = harness.pipeline(Clients {
            text_video: Arc::new(client),
            translator: Arc::new(translator),
            ..Clients::default()
        });

        let done = pipeline.run(&job(user_id, &record)).await.unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        let stored = harness.records.text_videos.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.translated_prompt.as_deref(), Some("A rocket about to take off"));
        assert_eq!(stored.video_url.as_deref(), Some(done.url.as_str()));
        assert!(harness.store.object("videos", "text-videos/clip.mp4").is_some());
    }

    #[tokio::test]
    async fn english_prompts_skip_translation() {
        let harness = Harness::new().await;
        let (user_id, record) = seed(&harness, "A rocket about to take off").await;
        harness.fetcher.serve(RESULT_URL, b"mp4".to_vec());
        let mut client = MockGenerationClient::new();
        client
            .expect_generate()
            .returning(|_| Ok(GenerationOutput::Handle(handle())));
        client.expect_job_status().returning(|_| {
            Ok(RemoteJobState::Completed {
                url: RESULT_URL.to_string(),
            })
        });
        let pipeline = harness.pipeline(Clients {
            text_video: Arc::new(client),
            ..Clients::default()
        });

        pipeline.run(&job(user_id, &record)).await.unwrap();

        let stored = harness.records.text_videos.get(record.id).await.unwrap().unwrap();
        assert!(stored.translated_prompt.is_none());
    }

    #[tokio::test]
    async fn remote_failure_is_an_upstream_error() {
        let harness = Harness::new().await;
        let (user_id, record) = seed(&harness, "A rocket").await;
        let mut client = MockGenerationClient::new();
        client
            .expect_generate()
            .returning(|_| Ok(GenerationOutput::Handle(handle())));
        client.expect_service().return_const("fal");
        client.expect_job_status().returning(|_| {
            Ok(RemoteJobState::Failed {
                reason: "nsfw content".to_string(),
            })
        });
        let pipeline = harness.pipeline(Clients {
            text_video: Arc::new(client),
            ..Clients::default()
        });

        let err = pipeline.run(&job(user_id, &record)).await.unwrap_err();

        assert!(matches!(err, PipelineError::Upstream { service: "fal", .. }));
        match harness.status.get(&text_video_key(record.id)).await {
            Some(StatusEntry::Failed { error }) => assert!(error.contains("nsfw content")),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn remote_job_that_never_finishes_times_out() {
        let harness = Harness::new().await;
        let (user_id, record) = seed(&harness, "A rocket").await;
        let mut client = MockGenerationClient::new();
        client
            .expect_generate()
            .returning(|_| Ok(GenerationOutput::Handle(handle())));
        client.expect_job_status().times(5).returning(|_| {
            Ok(RemoteJobState::Pending {
                status: "IN_QUEUE".to_string(),
            })
        });
        let pipeline = harness.pipeline(Clients {
            text_video: Arc::new(client),
            ..Clients::default()
        });

        let err = pipeline.run(&job(user_id, &record)).await.unwrap_err();

        assert!(matches!(err, PipelineError::AvailabilityTimeout { attempts: 5, .. }));
        assert_eq!(harness.store.len(), 0);
    }
}
