//! Assignment client - pulls rooms from the controller's `/assign` long-poll

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::controller::Assignment;
use crate::types::{Result, SwitchboardError};

/// Source of room assignments for the poll loop
#[async_trait]
pub trait AssignmentSource: Send + Sync {
    /// Next assignment, or `None` when the controller had no work
    async fn next_assignment(&self) -> Result<Option<Assignment>>;
}

/// Lenient view of an assignment body; validated before use
#[derive(Debug, Default, Deserialize)]
struct RawAssignment {
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    livekit_url: Option<String>,
    #[serde(default)]
    livekit_token: Option<String>,
}

impl RawAssignment {
    fn validate(self) -> std::result::Result<Assignment, &'static str> {
        fn required(
            value: Option<String>,
            name: &'static str,
        ) -> std::result::Result<String, &'static str> {
            value.filter(|v| !v.is_empty()).ok_or(name)
        }

        Ok(Assignment {
            room: required(self.room, "room")?,
            livekit_url: required(self.livekit_url, "livekit_url")?,
            livekit_token: required(self.livekit_token, "livekit_token")?,
        })
    }
}

/// HTTP client for the controller's `/assign` endpoint
pub struct AssignClient {
    assign_url: String,
    worker_id: String,
    http_client: reqwest::Client,
}

impl AssignClient {
    /// `request_timeout` must exceed the controller's long-poll budget
    pub fn new(
        controller_url: &str,
        worker_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            assign_url: format!("{}/assign", controller_url.trim_end_matches('/')),
            worker_id: worker_id.into(),
            http_client,
        })
    }

    pub fn assign_url(&self) -> &str {
        &self.assign_url
    }
}

#[async_trait]
impl AssignmentSource for AssignClient {
    async fn next_assignment(&self) -> Result<Option<Assignment>> {
        let response = self
            .http_client
            .get(&self.assign_url)
            .header("X-Worker-Id", &self.worker_id)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!("No work available");
                Ok(None)
            }
            StatusCode::OK => {
                let bytes = response.bytes().await?;
                let raw: RawAssignment = match serde_json::from_slice(&bytes) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("Unreadable assignment payload: {}", e);
                        return Ok(None);
                    }
                };
                match raw.validate() {
                    Ok(assignment) => Ok(Some(assignment)),
                    Err(field) => {
                        warn!("Assignment payload missing {}", field);
                        Ok(None)
                    }
                }
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SwitchboardError::Backend(format!(
                    "assign returned {}: {}",
                    status, body
                )))
            }
        }
    }
}
