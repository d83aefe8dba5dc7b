//! Liveness and version endpoints
//!
//! - /healthz, /health - liveness probe, `{"ok": true}` while the process runs
//! - /version - build information for deployment verification

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Version information response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    #[serde(rename = "commitFull")]
    pub commit_full: &'static str,
    #[serde(rename = "buildTime")]
    pub build_time: &'static str,
    pub service: &'static str,
}

/// Handle liveness probe (/healthz)
pub fn health_check() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &HealthResponse { ok: true })
}

/// Handle /version
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "switchboard",
    };
    json_response(StatusCode::OK, &response)
}
