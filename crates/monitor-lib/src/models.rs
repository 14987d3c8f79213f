//! Core data models for the throughput monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Fixed id of the persisted cursor document
pub const CURSOR_ID: &str = "MonitorToolState";

/// Name of one monitored counter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl Borrow<str> for Target {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Per-target counts keyed by target name
pub type Counts = BTreeMap<Target, u64>;

/// Counts captured at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub at: DateTime<Utc>,
    pub counts: Counts,
}

impl Observation {
    pub fn new(at: DateTime<Utc>, counts: Counts) -> Self {
        Self { at, counts }
    }
}

/// Result of comparing two consecutive observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub counts: Counts,
    pub deltas: Counts,
    pub elapsed_seconds: Option<f64>,
    pub time_per_unit: BTreeMap<Target, Option<f64>>,
    pub rate: BTreeMap<Target, Option<f64>>,
}

impl Sample {
    /// A baseline sample carries no derived fields
    pub fn is_baseline(&self) -> bool {
        self.elapsed_seconds.is_none()
    }
}

/// Coarse changelog entry of raw counts, written when any delta is non-zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ts: DateTime<Utc>,
    pub counts: Counts,
}

/// One entry of the producer's status log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
}

/// Position in the status log up to which entries were processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(pub DateTime<Utc>);

impl Cursor {
    pub fn last_ts(&self) -> DateTime<Utc> {
        self.0
    }

    /// Advance to `ts`, never moving backwards
    pub fn advance(&mut self, ts: DateTime<Utc>) {
        if ts > self.0 {
            self.0 = ts;
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor(DateTime::<Utc>::default())
    }
}

/// Persisted form of the cursor, upserted under [`CURSOR_ID`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorRecord {
    pub id: String,
    pub last_ts: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CursorRecord {
    pub fn new(cursor: Cursor, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: CURSOR_ID.to_string(),
            last_ts: cursor.last_ts(),
            updated_at,
        }
    }
}

/// Linear model parameters of `tpu = a + b * count`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub r2: Option<f64>,
}

/// Exponential model parameters of `tpu = c * exp(d * count)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExponentialParams {
    pub c: Option<f64>,
    pub d: Option<f64>,
    pub r2: Option<f64>,
}

/// Model family selected for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Linear,
    Exponential,
    Insufficient,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Linear => "linear",
            ModelKind::Exponential => "exponential",
            ModelKind::Insufficient => "insufficient",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    pub slope_last_k: Option<f64>,
}

/// Fitted cost model for one target at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub ts: DateTime<Utc>,
    pub target: Target,
    pub n_points: usize,
    pub linear: LinearParams,
    pub exponential: ExponentialParams,
    pub preferred: ModelKind,
    pub trend: TrendParams,
}
