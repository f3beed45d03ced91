//! Fixtures shared by the job tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;

use super::{Buckets, Pipeline};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::image_processing::tests::sample_png;
use crate::poller::PollPolicy;
use crate::providers::{GenerationClient, MediaFetcher, MockGenerationClient, MockTranslator, Translator};
use crate::records::{Background, GenType, Records, SourceImage, User};
use crate::status::CacheStatusChannel;
use crate::storage::ObjectStore;
use crate::storage::memory::MemoryObjectStore;

pub(crate) const SOURCE_URL: &str = "https://cdn.example.com/source.jpg";

/// Fetcher serving canned bytes; uploaded artifacts become reachable after a
/// configurable number of checks (never, if `None`).
pub(crate) struct FakeFetcher {
    sources: Mutex<HashMap<String, Vec<u8>>>,
    available_after: Mutex<Option<u32>>,
    checks: AtomicU32,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self {
            sources: Mutex::new(HashMap::new()),
            available_after: Mutex::new(Some(1)),
            checks: AtomicU32::new(0),
        }
    }

    pub(crate) fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.sources.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub(crate) fn available_after(&self, checks: Option<u32>) {
        *self.available_after.lock().unwrap() = checks;
    }

    pub(crate) fn availability_checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        self.sources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::Upstream {
                service: "media",
                status: Some(404),
                body: format!("{url} missing"),
            })
    }

    async fn is_available(&self, _url: &str) -> bool {
        let checks = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        match *self.available_after.lock().unwrap() {
            Some(after) => checks >= after,
            None => false,
        }
    }
}

pub(crate) struct Clients {
    pub backgrounds: Arc<dyn GenerationClient>,
    pub image_video: Arc<dyn GenerationClient>,
    pub text_video: Arc<dyn GenerationClient>,
    pub translator: Arc<dyn Translator>,
}

impl Default for Clients {
    fn default() -> Self {
        Self {
            backgrounds: Arc::new(MockGenerationClient::new()),
            image_video: Arc::new(MockGenerationClient::new()),
            text_video: Arc::new(MockGenerationClient::new()),
            translator: Arc::new(MockTranslator::new()),
        }
    }
}

pub(crate) struct Harness {
    _dir: TempDir,
    pub records: Arc<Records>,
    pub store: Arc<MemoryObjectStore>,
    pub status: Arc<CacheStatusChannel>,
    pub fetcher: Arc<FakeFetcher>,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let records = Arc::new(Records::open(dir.path()).await.unwrap());
        Self {
            _dir: dir,
            records,
            store: Arc::new(MemoryObjectStore::new()),
            status: Arc::new(CacheStatusChannel::new(Duration::from_secs(60), 1_000)),
            fetcher: Arc::new(FakeFetcher::new()),
        }
    }

    pub(crate) fn policy() -> PipelineConfig {
        PipelineConfig {
            availability: PollPolicy::attempts(10, Duration::ZERO),
            remote_job: PollPolicy::attempts(5, Duration::ZERO),
        }
    }

    pub(crate) fn pipeline(&self, clients: Clients) -> Pipeline {
        self.pipeline_with_store(clients, self.store.clone())
    }

    pub(crate) fn pipeline_with_store(&self, clients: Clients, store: Arc<dyn ObjectStore>) -> Pipeline {
        Pipeline {
            records: self.records.clone(),
            store,
            status: self.status.clone(),
            fetcher: self.fetcher.clone(),
            backgrounds: clients.backgrounds,
            image_video: clients.image_video,
            text_video: clients.text_video,
            translator: clients.translator,
            buckets: Buckets {
                media: "media".to_string(),
                video: "videos".to_string(),
            },
            policy: Self::policy(),
        }
    }

    pub(crate) async fn seed_user(&self) -> User {
        self.records
            .users
            .insert(|id, now| User::new(id, "tester", now))
            .await
            .unwrap()
    }

    pub(crate) async fn seed_image(&self, user_id: u64) -> SourceImage {
        self.fetcher.serve(SOURCE_URL, sample_png(8, 8));
        self.records
            .images
            .insert(|id, now| SourceImage {
                id,
                user_id,
                image_url: Some(SOURCE_URL.to_string()),
                artifact_key: None,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await
            .unwrap()
    }

    pub(crate) async fn seed_background(
        &self,
        user_id: u64,
        image_id: u64,
        image_url: Option<&str>,
    ) -> Background {
        let image_url = image_url.map(str::to_string);
        self.records
            .backgrounds
            .insert(|id, now| Background {
                id,
                user_id,
                image_id,
                gen_type: GenType::Concept,
                concept_option: r#"{"category":"food"}"#.to_string(),
                output_w: 1000,
                output_h: 1000,
                artifact_key: format!("seed-{id}.png"),
                image_url,
                recreated: false,
                created_at: now.clone(),
                updated_at: now,
                is_deleted: false,
            })
            .await
            .unwrap()
    }
}

/// Base64 body the background API answers with.
pub(crate) fn base64_png() -> Vec<u8> {
    STANDARD.encode(sample_png(6, 4)).into_bytes()
}
