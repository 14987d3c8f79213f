//! API client for the throughput monitor query surface

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the monitor's read-only endpoints
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request with query parameters
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn samples(&self, n: usize) -> Result<SamplesResponse> {
        self.get("api/samples", &[("n", n.to_string())]).await
    }

    pub async fn tpu_points(&self, target: &str, n: usize) -> Result<TpuResponse> {
        self.get(
            "api/tpu",
            &[("target", target.to_string()), ("n", n.to_string())],
        )
        .await
    }

    pub async fn model(&self, target: &str) -> Result<ModelResponse> {
        self.get("api/model", &[("target", target.to_string())])
            .await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.get("api/status", &[]).await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRow {
    pub ts: DateTime<Utc>,
    pub counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub time_per_unit: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplesResponse {
    pub samples: Vec<SampleRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpuPoint {
    pub n: u64,
    pub tpu: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpuResponse {
    pub target: String,
    pub points: Vec<TpuPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearParams {
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub r2: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExponentialParams {
    pub c: Option<f64>,
    pub d: Option<f64>,
    pub r2: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendParams {
    pub slope_last_k: Option<f64>,
}

/// Latest fitted model, or only `target` when nothing has been fitted yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear: Option<LinearParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exponential: Option<ExponentialParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendParams>,
}

impl ModelResponse {
    pub fn has_fit(&self) -> bool {
        self.preferred.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timestamp: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
