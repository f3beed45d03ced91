use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{ObjectStore, PublicUrlScheme, StorageError};

/// Object store backed by a local directory, one sub-directory per bucket.
/// The HTTP server exposes `root` under `/objects`, so a `PathStyle` scheme
/// pointing there makes every stored object publicly reachable.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    urls: PublicUrlScheme,
}

impl FsObjectStore {
    pub fn new(root: PathBuf, urls: PublicUrlScheme) -> Self {
        Self { root, urls }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[cfg(test)]
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn resolve_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let normalized = key.trim_start_matches('/');
        let relative = Path::new(bucket).join(normalized);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if bucket.is_empty() || normalized.is_empty() || escapes {
            return Err(StorageError::InvalidKey(format!("{bucket}/{key}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.resolve_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        tracing::debug!(
            bucket,
            key,
            content_type,
            size = data.len(),
            "stored object"
        );
        Ok(self.public_url(bucket, key))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.resolve_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.urls.url(bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> FsObjectStore {
        FsObjectStore::new(
            dir.path().to_path_buf(),
            PublicUrlScheme::PathStyle {
                base: "http://localhost:3000/objects".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn put_writes_bytes_and_returns_deterministic_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let url = store
            .put("media", "videos/a.mp4", b"video", "video/mp4")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:3000/objects/media/videos/a.mp4");
        assert_eq!(url, store.public_url("media", "videos/a.mp4"));
        assert_eq!(
            store.get("media", "videos/a.mp4").await.unwrap(),
            Some(b"video".to_vec())
        );
    }

    #[tokio::test]
    async fn delete_reports_missing_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.put("media", "a.png", b"png", "image/png").await.unwrap();

        store.delete("media", "a.png").await.unwrap();
        assert_eq!(store.get("media", "a.png").await.unwrap(), None);

        let err = store.delete("media", "a.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let err = store
            .put("media", "../outside.png", b"png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
