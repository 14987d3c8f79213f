//! Read-only HTTP surface: health, Prometheus metrics and store queries
//!
//! Handlers only go through [`StoreReader`], so the API can be served next
//! to the polling loop without sharing any of its in-memory state.

use crate::error::MonitorError;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::models::{Counts, FittedModel, Sample, Target};
use crate::store::StoreReader;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_SAMPLES_LIMIT: usize = 500;
const DEFAULT_POINTS_LIMIT: usize = 1000;
const DEFAULT_TARGET: &str = "chunks";

/// Shared application state
#[derive(Clone)]
pub struct ApiState {
    pub health_registry: HealthRegistry,
    pub store: Arc<dyn StoreReader>,
    pub targets: Vec<Target>,
}

impl ApiState {
    pub fn new(
        health_registry: HealthRegistry,
        store: Arc<dyn StoreReader>,
        targets: Vec<Target>,
    ) -> Self {
        Self {
            health_registry,
            store,
            targets,
        }
    }

    fn resolve_target(&self, requested: Option<String>) -> Result<Target, ApiError> {
        let name = requested.unwrap_or_else(|| DEFAULT_TARGET.to_string());
        self.targets
            .iter()
            .find(|t| t.as_str() == name)
            .cloned()
            .ok_or(ApiError::InvalidTarget)
    }
}

/// Errors surfaced by query handlers
#[derive(Debug)]
pub enum ApiError {
    InvalidTarget,
    Store(MonitorError),
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        ApiError::Store(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidTarget => (StatusCode::BAD_REQUEST, "invalid target".to_string()),
            ApiError::Store(e) => {
                warn!(error = %e, "Store query failed");
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    pub target: Option<String>,
    pub n: Option<usize>,
}

/// Trimmed sample row for charting
#[derive(Debug, Serialize, Deserialize)]
pub struct SampleRow {
    pub ts: DateTime<Utc>,
    pub counts: Counts,
    pub time_per_unit: BTreeMap<Target, Option<f64>>,
}

impl From<Sample> for SampleRow {
    fn from(sample: Sample) -> Self {
        Self {
            ts: sample.ts,
            counts: sample.counts,
            time_per_unit: sample.time_per_unit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SamplesResponse {
    pub samples: Vec<SampleRow>,
}

/// One (count, time-per-unit) scatter point
#[derive(Debug, Serialize, Deserialize)]
pub struct TpuPoint {
    pub n: u64,
    pub tpu: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TpuResponse {
    pub target: Target,
    pub points: Vec<TpuPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoModelResponse {
    pub target: Target,
    pub model: Option<FittedModel>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timestamp: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Health check: 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn samples(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<SamplesResponse>, ApiError> {
    let limit = query.n.unwrap_or(DEFAULT_SAMPLES_LIMIT);
    let rows = state.store.recent_samples(limit).await?;

    Ok(Json(SamplesResponse {
        samples: rows.into_iter().map(SampleRow::from).collect(),
    }))
}

/// Scatter series from the last `n` samples where the target produced units
async fn tpu(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<TpuResponse>, ApiError> {
    let target = state.resolve_target(query.target)?;
    let limit = query.n.unwrap_or(DEFAULT_POINTS_LIMIT);
    let rows = state.store.recent_samples(limit).await?;

    let points = rows
        .iter()
        .filter_map(|s| {
            let tpu = s.time_per_unit.get(&target).copied().flatten()?;
            let n = s.counts.get(&target).copied()?;
            Some(TpuPoint { n, tpu })
        })
        .collect();

    Ok(Json(TpuResponse { target, points }))
}

async fn model(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TargetQuery>,
) -> Result<Response, ApiError> {
    let target = state.resolve_target(query.target)?;

    match state.store.latest_model(target.as_str()).await? {
        Some(model) => Ok(Json(model).into_response()),
        None => Ok(Json(NoModelResponse {
            target,
            model: None,
        })
        .into_response()),
    }
}

async fn status(State(state): State<Arc<ApiState>>) -> Result<Json<StatusResponse>, ApiError> {
    let latest = state.store.latest_status().await?;

    Ok(Json(match latest {
        Some(entry) => StatusResponse {
            timestamp: Some(entry.timestamp),
            message: Some(entry.message),
        },
        None => StatusResponse {
            timestamp: None,
            message: None,
        },
    }))
}

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/samples", get(samples))
        .route("/api/tpu", get(tpu))
        .route("/api/model", get(model))
        .route("/api/status", get(status))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<ApiState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
