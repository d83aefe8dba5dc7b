//! Wire types for the container orchestrator
//!
//! Field names follow the ECS JSON protocol so the same structs serve the
//! HTTP backend and the in-process fakes.

use serde::{Deserialize, Serialize};

/// Identifier of one running task (the backend's task ARN)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(arn: impl Into<String>) -> Self {
        Self(arn.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOverride {
    pub name: String,
    pub environment: Vec<KeyValuePair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOverride {
    pub container_overrides: Vec<ContainerOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityProviderStrategyItem {
    pub capacity_provider: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsVpcConfiguration {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    pub awsvpc_configuration: AwsVpcConfiguration,
}

/// RunTask request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub capacity_provider_strategy: Vec<CapacityProviderStrategyItem>,
    pub count: u32,
    pub network_configuration: NetworkConfiguration,
    pub overrides: TaskOverride,
    pub enable_execute_command: bool,
}

impl RunTaskRequest {
    /// Environment handed to the agent container, if present
    pub fn environment(&self, container: &str) -> Option<&[KeyValuePair]> {
        self.overrides
            .container_overrides
            .iter()
            .find(|o| o.name == container)
            .map(|o| o.environment.as_slice())
    }
}

/// A task as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub task_arn: Option<String>,
    #[serde(default)]
    pub last_status: Option<String>,
    #[serde(default)]
    pub stopped_reason: Option<String>,
}

/// A per-task failure reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = self.reason.as_deref().unwrap_or("unknown");
        match (&self.arn, &self.detail) {
            (Some(arn), Some(detail)) => write!(f, "{} ({}): {}", reason, arn, detail),
            (Some(arn), None) => write!(f, "{} ({})", reason, arn),
            (None, Some(detail)) => write!(f, "{}: {}", reason, detail),
            (None, None) => f.write_str(reason),
        }
    }
}

/// RunTask / DescribeTasks response body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksResponse {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeTasksRequest {
    pub cluster: String,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTaskRequest {
    pub cluster: String,
    pub task: String,
    pub reason: String,
}

/// Outcome of waiting for a task to come up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// The backend reported RUNNING
    Running,
    /// The deadline passed without RUNNING; the task may still come up
    Pending { last_status: Option<String> },
    /// The backend could not be queried, or the task stopped before running
    BackendError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_response_tolerates_missing_fields() {
        let resp: TasksResponse = serde_json::from_str(r#"{"tasks":[{}]}"#).unwrap();
        assert_eq!(resp.tasks.len(), 1);
        assert!(resp.tasks[0].task_arn.is_none());
        assert!(resp.failures.is_empty());
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure {
            arn: Some("arn:aws:ecs:cap".into()),
            reason: Some("RESOURCE:MEMORY".into()),
            detail: None,
        };
        assert_eq!(failure.to_string(), "RESOURCE:MEMORY (arn:aws:ecs:cap)");
        assert_eq!(Failure::default().to_string(), "unknown");
    }
}
