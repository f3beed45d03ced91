use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ObjectStore, PublicUrlScheme, StorageError};

/// In-memory store used by pipeline tests.
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), (Vec<u8>, String)>>,
    urls: PublicUrlScheme,
    fail_puts: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            urls: PublicUrlScheme::S3 {
                region: "ap-northeast-2".to_string(),
            },
            fail_puts: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::new()
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        if self.fail_puts {
            return Err(StorageError::Io(std::io::Error::other("bucket unavailable")));
        }
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            (data.to_vec(), content_type.to_string()),
        );
        Ok(self.public_url(bucket, key))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.urls.url(bucket, key)
    }
}
