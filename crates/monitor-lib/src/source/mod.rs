//! Observation sources
//!
//! A source reports the current count of every tracked target and the
//! producer's status-log entries newer than a cursor. The monitor never
//! writes to a source.

mod fs;

pub use fs::{FsObservationSource, STATUS_LOG_FILE};

use crate::error::Result;
use crate::models::{Counts, Cursor, StatusEntry};
use async_trait::async_trait;

/// Read-only view of the observed producer
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Current count of each tracked target
    async fn current_counts(&self) -> Result<Counts>;

    /// Status-log entries strictly newer than `since`, ordered by timestamp
    async fn new_log_entries(&self, since: Cursor) -> Result<Vec<StatusEntry>>;
}
