//! Operator status endpoint
//!
//! Shows the operating mode, pending rooms (head first) and every claim with
//! its age and, in direct mode, the task it launched.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

use super::json_response;
use crate::server::AppState;

/// Handle GET /status
pub fn status_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.controller.status())
}
