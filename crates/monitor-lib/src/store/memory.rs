//! In-memory store, used when embedding the engine and in tests

use super::{MonitorStore, StoreReader};
use crate::error::Result;
use crate::models::{CursorRecord, FittedModel, Sample, Snapshot, StatusEntry};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Collections {
    samples: Vec<Sample>,
    snapshots: Vec<Snapshot>,
    statuses: Vec<StatusEntry>,
    models: Vec<FittedModel>,
    cursor: Option<CursorRecord>,
}

/// Store keeping every record in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn samples(&self) -> Vec<Sample> {
        self.inner.read().await.samples.clone()
    }

    pub async fn snapshots(&self) -> Vec<Snapshot> {
        self.inner.read().await.snapshots.clone()
    }

    pub async fn statuses(&self) -> Vec<StatusEntry> {
        self.inner.read().await.statuses.clone()
    }

    pub async fn models(&self) -> Vec<FittedModel> {
        self.inner.read().await.models.clone()
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        self.inner.write().await.samples.push(sample.clone());
        Ok(())
    }

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.inner.write().await.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn insert_status(&self, entry: &StatusEntry) -> Result<()> {
        self.inner.write().await.statuses.push(entry.clone());
        Ok(())
    }

    async fn insert_fitted_model(&self, model: &FittedModel) -> Result<()> {
        self.inner.write().await.models.push(model.clone());
        Ok(())
    }

    async fn load_cursor(&self) -> Result<Option<CursorRecord>> {
        Ok(self.inner.read().await.cursor.clone())
    }

    async fn save_cursor(&self, record: &CursorRecord) -> Result<()> {
        self.inner.write().await.cursor = Some(record.clone());
        Ok(())
    }
}

#[async_trait]
impl StoreReader for MemoryStore {
    async fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>> {
        let inner = self.inner.read().await;
        let start = inner.samples.len().saturating_sub(limit);
        Ok(inner.samples[start..].to_vec())
    }

    async fn latest_model(&self, target: &str) -> Result<Option<FittedModel>> {
        let inner = self.inner.read().await;
        Ok(inner
            .models
            .iter()
            .rev()
            .find(|m| m.target.as_str() == target)
            .cloned())
    }

    async fn latest_status(&self) -> Result<Option<StatusEntry>> {
        Ok(self.inner.read().await.statuses.last().cloned())
    }
}
