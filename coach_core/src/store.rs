//! Plan store: persists one [`PersistedPlanRecord`] per user.
//!
//! `JsonFilePlanStore` keeps one JSON file per user, replaced atomically
//! under an exclusive lock. `MemoryPlanStore` keeps records in process.

use crate::types::{PersistedPlanRecord, UserFailure};
use crate::{Error, Result};
use async_trait::async_trait;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;

/// Result of a batched read
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchGetOutput {
    pub records: Vec<PersistedPlanRecord>,
    /// Users whose record exists but could not be read
    pub unprocessed: Vec<UserFailure>,
}

/// Keyed storage for per-user plan records
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Fetch records for all `user_ids` in one batch; unknown users are absent
    async fn get(&self, user_ids: &[String]) -> Result<BatchGetOutput>;

    /// Overwrite the user's record in full
    async fn put(&self, record: PersistedPlanRecord) -> Result<()>;
}

/// File-per-user plan store rooted at a directory
#[derive(Clone, Debug)]
pub struct JsonFilePlanStore {
    dir: PathBuf,
}

impl JsonFilePlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<data_dir>/plans`
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("plans"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a user's record; bytes outside `[A-Za-z0-9_.-]` and leading
    /// dots are hex-escaped
    pub fn record_path(&self, user_id: &str) -> PathBuf {
        let mut stem = String::with_capacity(user_id.len());
        let mut leading = true;
        for byte in user_id.bytes() {
            if byte != b'.' {
                leading = false;
            }
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => stem.push(byte as char),
                b'.' if !leading => stem.push('.'),
                other => stem.push_str(&format!("%{:02X}", other)),
            }
        }
        self.dir.join(format!("{}.json", stem))
    }
}

/// Read JSON under a shared lock; `None` when the file does not exist
pub(crate) fn read_json_locked<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    let value = serde_json::from_str::<T>(&contents)?;
    tracing::debug!("Loaded {:?}", path);
    Ok(Some(value))
}

/// Atomically replace `path` with the JSON form of `value`:
/// 1. Write to a temp file in the same directory
/// 2. Sync to disk
/// 3. Rename over the original
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    // Exclusive lock on the temp file serializes concurrent writers
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved {:?}", path);
    Ok(())
}

async fn blocking<T, F>(user_id: &str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::persistence(user_id, format!("store task failed: {}", e)))?
}

#[async_trait]
impl PlanStore for JsonFilePlanStore {
    async fn get(&self, user_ids: &[String]) -> Result<BatchGetOutput> {
        let paths: Vec<(String, PathBuf)> = user_ids
            .iter()
            .map(|id| (id.clone(), self.record_path(id)))
            .collect();

        blocking("batch", move || {
            let mut output = BatchGetOutput::default();
            for (user_id, path) in paths {
                match read_json_locked::<PersistedPlanRecord>(&path) {
                    Ok(Some(record)) => output.records.push(record),
                    Ok(None) => tracing::debug!(user_id = %user_id, "No stored plan"),
                    Err(e) => {
                        tracing::error!(user_id = %user_id, "Failed to read stored plan {:?}: {}", path, e);
                        let error = Error::persistence(&user_id, e);
                        output.unprocessed.push(UserFailure::new(user_id, error));
                    }
                }
            }
            Ok(output)
        })
        .await
    }

    async fn put(&self, record: PersistedPlanRecord) -> Result<()> {
        let path = self.record_path(&record.user_id);
        let user_id = record.user_id.clone();
        let task_user = user_id.clone();
        blocking(&user_id, move || {
            write_json_atomic(&path, &record).map_err(|e| Error::persistence(&task_user, e))
        })
        .await
    }
}

/// In-process plan store
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    records: RwLock<HashMap<String, PersistedPlanRecord>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn get(&self, user_ids: &[String]) -> Result<BatchGetOutput> {
        let records = self.records.read().await;
        Ok(BatchGetOutput {
            records: user_ids
                .iter()
                .filter_map(|id| records.get(id).cloned())
                .collect(),
            unprocessed: Vec::new(),
        })
    }

    async fn put(&self, record: PersistedPlanRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.user_id.clone(), record);
        Ok(())
    }
}
