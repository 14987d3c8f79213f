//! Durable sinks for samples, snapshots, status entries, fitted models and
//! the status-log cursor
//!
//! The polling loop is the only writer. Query endpoints go through
//! [`StoreReader`] and never see the loop's in-memory history.

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{CursorRecord, FittedModel, Sample, Snapshot, StatusEntry};
use async_trait::async_trait;

/// Append-only writer side of the store
#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn insert_sample(&self, sample: &Sample) -> Result<()>;

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Record a processed status-log entry
    async fn insert_status(&self, entry: &StatusEntry) -> Result<()>;

    async fn insert_fitted_model(&self, model: &FittedModel) -> Result<()>;

    /// Load the persisted cursor, if any
    async fn load_cursor(&self) -> Result<Option<CursorRecord>>;

    /// Upsert the cursor document
    async fn save_cursor(&self, record: &CursorRecord) -> Result<()>;
}

/// Read-only side of the store used by the query surface
#[async_trait]
pub trait StoreReader: Send + Sync {
    /// Last `limit` samples in chronological order
    async fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>>;

    /// Most recent fitted model for `target`
    async fn latest_model(&self, target: &str) -> Result<Option<FittedModel>>;

    /// Most recently processed status entry
    async fn latest_status(&self) -> Result<Option<StatusEntry>>;
}
