//! Health endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload with the forwarder version,
//! uptime, the active routing policy and origin, the effective deadline and
//! redirect mode, config provenance, and cumulative request statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub policy: String,
    pub origin: String,
    /// `None` when the origin call has no deadline.
    pub timeout_ms: Option<u64>,
    pub redirect: String,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_timed_out: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let settings = &state.settings;
    let policy = &settings.policy;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        policy: policy.mode().to_string(),
        origin: format!("{}://{}", policy.scheme(), policy.origin()),
        timeout_ms: settings
            .timeout
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        redirect: settings.redirect.as_str().to_string(),
        config: ConfigHealth {
            source: state.config_source.clone(),
            version: state.config_version.short().to_string(),
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            requests_timed_out: state.stats.timed_out.load(Ordering::Relaxed),
        },
    })
}
