//! Throughput monitor library
//!
//! This crate provides the core functionality for:
//! - Sampling per-target counters and deriving time-per-unit and rate
//! - Per-target history buffers and cost-model regression
//! - Durable stores and the producer status-log cursor
//! - The polling engine and its read-only HTTP query surface
//! - Health checks and observability

pub mod api;
pub mod delta;
pub mod engine;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod regression;
pub mod source;
pub mod store;

pub use engine::{EngineConfig, LoopContext, PollEngine, PollEngineBuilder, TickReport};
pub use error::MonitorError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::{HistoryBuffer, HistoryPoint, RetentionPolicy, TargetHistories};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use source::{FsObservationSource, ObservationSource};
pub use store::{JsonlStore, MemoryStore, MonitorStore, StoreReader};
