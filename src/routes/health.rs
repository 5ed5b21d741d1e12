//! Health check endpoints
//!
//! - /health, /healthz - liveness (is the service running?)
//! - /ready, /readyz - readiness (does MongoDB answer a ping?)
//! - /version - build metadata for deployment verification

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::config::PhotoBackend;
use crate::server::AppState;

/// Health response body
#[derive(Serialize)]
pub struct HealthResponse {
    /// Whether the service is up (liveness) or fully serviceable (readiness)
    pub healthy: bool,
    /// 'online' when MongoDB answers, 'degraded' otherwise
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Seconds since process start
    pub uptime: u64,
    /// Current timestamp
    pub timestamp: String,
    /// Store connectivity
    pub mongo: MongoHealth,
    /// Enabled optional capabilities
    pub capabilities: Capabilities,
}

#[derive(Serialize)]
pub struct MongoHealth {
    pub connected: bool,
}

#[derive(Serialize)]
pub struct Capabilities {
    pub geocoding: bool,
    pub photo_storage: &'static str,
    pub photo_normalization: bool,
}

fn build_health_response(state: &AppState, mongo_connected: bool) -> HealthResponse {
    HealthResponse {
        healthy: true,
        status: if mongo_connected { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mongo: MongoHealth {
            connected: mongo_connected,
        },
        capabilities: Capabilities {
            geocoding: state.tally.geocoding_enabled(),
            photo_storage: match state.args.photo_storage {
                PhotoBackend::None => "none",
                PhotoBackend::Local => "local",
                PhotoBackend::S3 => "s3",
            },
            photo_normalization: state.args.normalize_photos,
        },
    }
}

fn respond(status: StatusCode, response: &HealthResponse) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(response)
        .unwrap_or_else(|_| r#"{"healthy":false,"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Handle liveness probe (/health, /healthz)
///
/// Always 200 while the process is serving; the body reports store
/// connectivity for the curious but does not gate the status code.
pub async fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo_connected = state.tally.ping().await.is_ok();
    respond(StatusCode::OK, &build_health_response(&state, mongo_connected))
}

/// Handle readiness probe (/ready, /readyz)
///
/// 200 only when MongoDB answers a ping; load balancers should gate
/// traffic on this one.
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo_connected = state.tally.ping().await.is_ok();
    let response = build_health_response(&state, mongo_connected);

    let status = if mongo_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    respond(status, &response)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "cookiejar",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
