//! JSON-lines directory store
//!
//! Layout under the store directory:
//! - `samples.jsonl`, `snapshots.jsonl`, `stats.jsonl`, `status.jsonl`:
//!   one record per line, appended and fsynced per write
//! - `state.json`: the cursor document, replaced atomically

use super::{MonitorStore, StoreReader};
use crate::error::{MonitorError, Result};
use crate::models::{CursorRecord, FittedModel, Sample, Snapshot, StatusEntry};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SAMPLES_FILE: &str = "samples.jsonl";
const SNAPSHOTS_FILE: &str = "snapshots.jsonl";
const STATS_FILE: &str = "stats.jsonl";
const STATUS_FILE: &str = "status.jsonl";
const STATE_FILE: &str = "state.json";

/// Durable store backed by JSON-lines files in one directory
pub struct JsonlStore {
    dir: PathBuf,
    /// Serializes appends so concurrent writers never interleave lines
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (and create if needed) the store directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            MonitorError::store(format!("failed to create {}: {}", dir.display(), e))
        })?;
        info!(path = %dir.display(), "Opened JSON-lines store");

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let path = self.dir.join(file);
        let _guard = self.write_lock.lock().await;

        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_failure("open", &path, e))?;

        handle
            .write_all(&line)
            .await
            .map_err(|e| io_failure("append", &path, e))?;
        handle
            .flush()
            .await
            .map_err(|e| io_failure("flush", &path, e))?;
        handle
            .sync_data()
            .await
            .map_err(|e| io_failure("sync", &path, e))?;

        Ok(())
    }

    /// Read every well-formed record of `file`; a partially written trailing
    /// line is skipped
    async fn read_all<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MonitorError::store(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(file = file, line = lineno + 1, error = %e, "Skipping unreadable record")
                }
            }
        }
        Ok(records)
    }
}

/// Every I/O failure of the store surfaces as a store error
fn io_failure(action: &str, path: &Path, err: std::io::Error) -> MonitorError {
    MonitorError::store(format!("failed to {} {}: {}", action, path.display(), err))
}

#[async_trait]
impl MonitorStore for JsonlStore {
    async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        self.append(SAMPLES_FILE, sample).await
    }

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.append(SNAPSHOTS_FILE, snapshot).await
    }

    async fn insert_status(&self, entry: &StatusEntry) -> Result<()> {
        self.append(STATUS_FILE, entry).await
    }

    async fn insert_fitted_model(&self, model: &FittedModel) -> Result<()> {
        self.append(STATS_FILE, model).await
    }

    async fn load_cursor(&self) -> Result<Option<CursorRecord>> {
        let path = self.dir.join(STATE_FILE);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MonitorError::store(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match serde_json::from_slice(&data) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cursor document unreadable, starting from the beginning");
                Ok(None)
            }
        }
    }

    async fn save_cursor(&self, record: &CursorRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        let path = self.dir.join(STATE_FILE);
        let temp_path = path.with_extension("tmp");

        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(|e| {
                MonitorError::store(format!("failed to create {}: {}", temp_path.display(), e))
            })?;
        file.write_all(&json)
            .await
            .map_err(|e| io_failure("write", &temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_failure("sync", &temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &path).await.map_err(|e| {
            MonitorError::store(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl StoreReader for JsonlStore {
    async fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>> {
        let mut samples: Vec<Sample> = self.read_all(SAMPLES_FILE).await?;
        let start = samples.len().saturating_sub(limit);
        Ok(samples.split_off(start))
    }

    async fn latest_model(&self, target: &str) -> Result<Option<FittedModel>> {
        let models: Vec<FittedModel> = self.read_all(STATS_FILE).await?;
        Ok(models.into_iter().rev().find(|m| m.target.as_str() == target))
    }

    async fn latest_status(&self) -> Result<Option<StatusEntry>> {
        let entries: Vec<StatusEntry> = self.read_all(STATUS_FILE).await?;
        Ok(entries.into_iter().last())
    }
}
