//! ECS backend over the JSON 1.1 HTTP protocol
//!
//! Each operation is a POST to the service root with the operation named in
//! `X-Amz-Target`. Requests are sent unsigned; the configured endpoint is
//! expected to be a signing proxy or a local emulator.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::types::{
    DescribeTasksRequest, RunTaskRequest, StopTaskRequest, Task, TaskHandle, TasksResponse,
};
use super::TaskBackend;
use crate::types::{Result, SwitchboardError};

const TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Task backend talking to an ECS-compatible endpoint
pub struct EcsBackend {
    endpoint: String,
    http_client: reqwest::Client,
}

impl EcsBackend {
    /// Create a backend for `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!(operation = %operation, endpoint = %self.endpoint, "ECS call");

        let response = self
            .http_client
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(SwitchboardError::Backend(format!(
                "{} returned {}: {}",
                operation,
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            SwitchboardError::Backend(format!("{} returned an unreadable body: {}", operation, e))
        })
    }
}

#[async_trait]
impl TaskBackend for EcsBackend {
    async fn run_task(&self, request: &RunTaskRequest) -> Result<TasksResponse> {
        self.call("RunTask", request).await
    }

    async fn describe_task(&self, cluster: &str, task: &TaskHandle) -> Result<Option<Task>> {
        let request = DescribeTasksRequest {
            cluster: cluster.to_string(),
            tasks: vec![task.to_string()],
        };
        let response: TasksResponse = self.call("DescribeTasks", &request).await?;
        Ok(response.tasks.into_iter().next())
    }

    async fn stop_task(&self, cluster: &str, task: &TaskHandle, reason: &str) -> Result<()> {
        let request = StopTaskRequest {
            cluster: cluster.to_string(),
            task: task.to_string(),
            reason: reason.to_string(),
        };
        let _: serde_json::Value = self.call("StopTask", &request).await?;
        Ok(())
    }
}
