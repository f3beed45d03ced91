//! Durable records: one JSON document per row, grouped in per-type tables.

pub mod models;
pub mod table;

pub use models::*;
pub use table::{JsonTable, Record, RecordError};

use std::path::Path;

/// Every table the service persists.
pub struct Records {
    pub users: JsonTable<User>,
    pub images: JsonTable<SourceImage>,
    pub backgrounds: JsonTable<Background>,
    pub videos: JsonTable<Video>,
    pub text_videos: JsonTable<TextVideo>,
    pub resizings: JsonTable<ImageResizing>,
}

impl Records {
    pub async fn open(root: &Path) -> Result<Self, RecordError> {
        Ok(Self {
            users: JsonTable::open(root).await?,
            images: JsonTable::open(root).await?,
            backgrounds: JsonTable::open(root).await?,
            videos: JsonTable::open(root).await?,
            text_videos: JsonTable::open(root).await?,
            resizings: JsonTable::open(root).await?,
        })
    }
}
