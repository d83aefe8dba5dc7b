//! HTTP routes for Switchboard

pub mod assign;
pub mod health;
pub mod status;
pub mod webhook;

pub use assign::handle_assign;
pub use health::{health_check, version_info};
pub use status::status_check;
pub use webhook::handle_webhook;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Serialize `value` into a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_status(status, Some(body)),
        Err(e) => with_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(
                serde_json::json!({"error": "Serialization failed", "message": e.to_string()})
                    .to_string()
                    .into_bytes(),
            ),
        ),
    }
}

/// JSON error body: `{"error": ..., "message": ...}`
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message,
    });
    with_status(status, Some(body.to_string().into_bytes()))
}

pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path))
}

pub fn method_not_allowed_response(path: &str) -> Response<Full<Bytes>> {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &format!("Method not allowed on {}", path),
    )
}

/// Empty-bodied response
pub fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    with_status(status, None)
}

fn with_status(status: StatusCode, json: Option<Vec<u8>>) -> Response<Full<Bytes>> {
    let mut response = match json {
        Some(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        None => Response::new(Full::new(Bytes::new())),
    };
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_response_body() {
        let response = error_response(StatusCode::METHOD_NOT_ALLOWED, "nope");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Method Not Allowed");
        assert_eq!(json["message"], "nope");
    }

    #[test]
    fn test_empty_response_has_no_content_type() {
        let response = empty_response(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }
}
