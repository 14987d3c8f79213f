//! Error taxonomy for the monitor
//!
//! Degenerate numeric input is never an error here: the regression engine
//! reports it as `None` fields instead.

use thiserror::Error;

/// Errors raised by the polling engine and its collaborators
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The observation source could not be queried
    #[error("observation source unavailable: {0}")]
    Source(String),

    /// A store read or write failed
    #[error("store operation failed: {0}")]
    Store(String),

    /// Invalid configuration, only raised at startup
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MonitorError {
    /// Transient errors skip the tick; the loop keeps running
    pub fn is_transient(&self) -> bool {
        !matches!(self, MonitorError::Config(_))
    }

    pub fn unavailable(msg: impl std::fmt::Display) -> Self {
        MonitorError::Source(msg.to_string())
    }

    pub fn store(msg: impl std::fmt::Display) -> Self {
        MonitorError::Store(msg.to_string())
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
