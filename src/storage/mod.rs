pub mod fs;
pub mod hash;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsObjectStore;
pub use hash::upload_key;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How public URLs are composed. URLs are a pure function of bucket, region
/// and key, never read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicUrlScheme {
    /// `https://{bucket}.s3.{region}.amazonaws.com/{key}`
    S3 { region: String },
    /// `{base}/{bucket}/{key}`
    PathStyle { base: String },
}

impl PublicUrlScheme {
    pub fn url(&self, bucket: &str, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match self {
            Self::S3 { region } => {
                format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
            }
            Self::PathStyle { base } => {
                format!("{}/{bucket}/{key}", base.trim_end_matches('/'))
            }
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `bucket/key`, replacing any previous object, and
    /// returns its public URL.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Removes `bucket/key`. A missing object is reported as
    /// [`StorageError::NotFound`].
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}

pub fn get_extension_from_mime_type(mime_type: &str) -> &str {
    match mime_type.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}
