use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{table} {id} not found")]
    NotFound { table: &'static str, id: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> u64;
    fn is_deleted(&self) -> bool;
    fn mark_deleted(&mut self);
    fn touch(&mut self, now: String);
}

/// Table of records stored as `{root}/{TABLE}/{id}.json`.
///
/// Ids are allocated from a counter seeded with the highest id on disk, so a
/// key is never handed out twice. Writes are serialized per table, which makes
/// `update` an atomic read-modify-write against other callers in-process.
pub struct JsonTable<T> {
    dir: PathBuf,
    next_id: AtomicU64,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> JsonTable<T> {
    pub async fn open(root: &Path) -> Result<Self, RecordError> {
        let dir = root.join(T::TABLE);
        fs::create_dir_all(&dir).await?;
        let mut max_id = 0;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                max_id = max_id.max(id);
            }
        }
        Ok(Self {
            dir,
            next_id: AtomicU64::new(max_id + 1),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub async fn insert(&self, build: impl FnOnce(u64, String) -> T) -> Result<T, RecordError> {
        let _guard = self.write_lock.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = build(id, now());
        debug_assert_eq!(record.id(), id);
        self.write(&record).await?;
        Ok(record)
    }

    /// Reads a record, including soft-deleted ones.
    pub async fn get(&self, id: u64) -> Result<Option<T>, RecordError> {
        match fs::read(self.path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads a record unless it is missing or soft-deleted.
    pub async fn get_live(&self, id: u64) -> Result<Option<T>, RecordError> {
        Ok(self.get(id).await?.filter(|record| !record.is_deleted()))
    }

    pub async fn require_live(&self, id: u64) -> Result<T, RecordError> {
        self.get_live(id).await?.ok_or(RecordError::NotFound {
            table: T::TABLE,
            id,
        })
    }

    /// Applies `change` to a live record by primary key and persists it. A
    /// record soft-deleted before the lock was taken is reported as missing
    /// and left untouched.
    pub async fn update(&self, id: u64, change: impl FnOnce(&mut T)) -> Result<T, RecordError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.require_live(id).await?;
        change(&mut record);
        record.touch(now());
        self.write(&record).await?;
        Ok(record)
    }

    /// Hides a live record from every later live read.
    pub async fn soft_delete(&self, id: u64) -> Result<T, RecordError> {
        self.update(id, |record| record.mark_deleted()).await
    }

    pub async fn list(&self) -> Result<Vec<T>, RecordError> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            let record: T = serde_json::from_slice(&bytes)?;
            if !record.is_deleted() {
                records.push(record);
            }
        }
        records.sort_by_key(|record| record.id());
        Ok(records)
    }

    async fn write(&self, record: &T) -> Result<(), RecordError> {
        let path = self.path(record.id());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}
