//! Room lifecycle webhook
//!
//! Always answers with a definite `status`. Unreadable or oversized bodies
//! are treated as empty events so the platform never retries on our account;
//! only a failed direct launch produces a non-2xx status.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::warn;

use super::json_response;
use crate::server::AppState;

/// Largest webhook body read; anything bigger is ignored
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

/// Handle POST /webhook
pub async fn handle_webhook(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let body = match Limited::new(req.into_body(), MAX_WEBHOOK_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!("Webhook body exceeds {} bytes, ignoring", MAX_WEBHOOK_BODY_BYTES);
            Bytes::new()
        }
        Err(e) => {
            warn!("Failed to read webhook body: {}", e);
            Bytes::new()
        }
    };

    let outcome = state.controller.handle_webhook(&body).await;
    json_response(outcome.http_status(), &outcome)
}
