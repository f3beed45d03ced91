//! Side channel for cheap success/error lookups.
//!
//! Entries are overwritten on every attempt and expire on their own; the
//! durable record stays the source of truth.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusEntry {
    Ready { url: String },
    Failed { error: String },
}

#[async_trait]
pub trait StatusChannel: Send + Sync {
    async fn set(&self, key: &str, entry: StatusEntry);
    async fn get(&self, key: &str) -> Option<StatusEntry>;
    async fn delete(&self, key: &str);
}

pub fn background_key(image_id: u64) -> String {
    format!("background_image_url_{image_id}")
}

pub fn video_key(background_id: u64) -> String {
    format!("video_url_{background_id}")
}

pub fn text_video_key(text_video_id: u64) -> String {
    format!("text_video_url_{text_video_id}")
}

pub fn resized_image_key(background_id: u64) -> String {
    format!("resized_image_url_{background_id}")
}

/// moka-backed status channel with a per-entry time to live.
#[derive(Clone)]
pub struct CacheStatusChannel {
    entries: Cache<String, StatusEntry>,
}

impl CacheStatusChannel {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl StatusChannel for CacheStatusChannel {
    async fn set(&self, key: &str, entry: StatusEntry) {
        self.entries.insert(key.to_string(), entry).await;
    }

    async fn get(&self, key: &str) -> Option<StatusEntry> {
        self.entries.get(key).await
    }

    async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}
