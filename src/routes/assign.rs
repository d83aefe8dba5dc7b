//! Long-poll assignment endpoint for pooled workers
//!
//! 200 with `{room, livekit_url, livekit_token}` when a room was dequeued,
//! 204 with an empty body when nothing arrived within the wait budget.
//! Direct-mode controllers don't queue rooms and answer 404.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::error;

use super::{empty_response, error_response, json_response};
use crate::config::Mode;
use crate::server::AppState;

/// Handle GET /assign
pub async fn handle_assign(state: Arc<AppState>) -> Response<Full<Bytes>> {
    if state.controller.mode() != Mode::Pool {
        return error_response(
            StatusCode::NOT_FOUND,
            "Assignments are only served in pool mode",
        );
    }

    match state.controller.assign().await {
        Ok(Some(assignment)) => json_response(StatusCode::OK, &assignment),
        Ok(None) => empty_response(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Assignment failed: {}", e);
            error_response(e.status_code(), &e.to_string())
        }
    }
}
