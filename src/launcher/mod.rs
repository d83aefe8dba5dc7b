//! Task launcher - runs one agent task per room on the compute backend
//!
//! ## Overview
//!
//! The launcher owns everything the controller needs from the container
//! orchestrator:
//! - `launch()` validates network placement, builds the run request with the
//!   agent's environment overrides, and returns the task handle
//! - `await_running()` optionally waits for the task to report RUNNING
//! - `stop()` asks the backend to terminate a task, best effort
//!
//! The backend itself sits behind [`TaskBackend`], so the launcher can be
//! driven against the ECS HTTP API or an in-process fake.

pub mod ecs;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use ecs::EcsBackend;
pub use types::{RunState, RunTaskRequest, TaskHandle, TasksResponse};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::AssignPublicIp;
use crate::types::{LaunchError, Result, SwitchboardError};
use self::types::{
    AwsVpcConfiguration, CapacityProviderStrategyItem, ContainerOverride, KeyValuePair,
    NetworkConfiguration, Task, TaskOverride,
};

/// Status the backend reports once a task is up
const STATUS_RUNNING: &str = "RUNNING";
/// Status the backend reports once a task is gone
const STATUS_STOPPED: &str = "STOPPED";

/// Operations the launcher needs from a container orchestrator
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Start tasks; per-task failures are reported in the response, not as an error
    async fn run_task(&self, request: &RunTaskRequest) -> Result<TasksResponse>;

    /// Current state of one task, `None` if the backend doesn't know it
    async fn describe_task(&self, cluster: &str, task: &TaskHandle) -> Result<Option<Task>>;

    /// Ask the backend to terminate a task
    async fn stop_task(&self, cluster: &str, task: &TaskHandle, reason: &str) -> Result<()>;
}

/// Launcher configuration
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Cluster that runs agent tasks
    pub cluster: String,
    /// Task definition for agent tasks
    pub task_definition: String,
    /// Container that receives the environment overrides
    pub container: String,
    /// Placement subnets (at least one required)
    pub subnets: Vec<String>,
    /// Placement security groups (at least one required)
    pub security_groups: Vec<String>,
    /// Capacity provider (weight 1)
    pub capacity_provider: String,
    pub assign_public_ip: AssignPublicIp,
    /// Wait for RUNNING after each launch, if set
    pub wait_for_running: Option<Duration>,
    /// Extra variables for every task (provider API keys, voice id)
    pub passthrough_env: Vec<(String, String)>,
    /// Delay between describe calls while waiting for RUNNING
    pub describe_interval: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            cluster: "lk-agents".to_string(),
            task_definition: "lk-agent:1".to_string(),
            container: "agent".to_string(),
            subnets: Vec::new(),
            security_groups: Vec::new(),
            capacity_provider: "FARGATE_SPOT".to_string(),
            assign_public_ip: AssignPublicIp::Enabled,
            wait_for_running: None,
            passthrough_env: Vec::new(),
            describe_interval: Duration::from_secs(2),
        }
    }
}

/// Launches and stops agent tasks
pub struct TaskLauncher {
    backend: Arc<dyn TaskBackend>,
    config: LauncherConfig,
}

impl TaskLauncher {
    pub fn new(backend: Arc<dyn TaskBackend>, config: LauncherConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Fail fast on missing network placement, before any backend call
    pub fn validate_placement(&self) -> Result<()> {
        if self.config.subnets.is_empty() {
            return Err(SwitchboardError::Config(
                "SUBNETS_CSV is empty; provide at least one subnet id".into(),
            ));
        }
        if self.config.security_groups.is_empty() {
            return Err(SwitchboardError::Config(
                "SECGRPS_CSV is empty; provide at least one security group id".into(),
            ));
        }
        Ok(())
    }

    /// Build the run request for one room
    ///
    /// The agent always sees `ROOM_NAME`, `LIVEKIT_URL` and `LIVEKIT_TOKEN`,
    /// followed by the configured passthrough variables and then `extra_env`.
    pub fn build_request(
        &self,
        room: &str,
        join_url: &str,
        credential: &str,
        extra_env: &[(String, String)],
    ) -> RunTaskRequest {
        let mut environment = vec![
            env_pair("ROOM_NAME", room),
            env_pair("LIVEKIT_URL", join_url),
            env_pair("LIVEKIT_TOKEN", credential),
        ];
        environment.extend(
            self.config
                .passthrough_env
                .iter()
                .chain(extra_env.iter())
                .map(|(name, value)| env_pair(name, value)),
        );

        RunTaskRequest {
            cluster: self.config.cluster.clone(),
            task_definition: self.config.task_definition.clone(),
            capacity_provider_strategy: vec![CapacityProviderStrategyItem {
                capacity_provider: self.config.capacity_provider.clone(),
                weight: 1,
            }],
            count: 1,
            network_configuration: NetworkConfiguration {
                awsvpc_configuration: AwsVpcConfiguration {
                    subnets: self.config.subnets.clone(),
                    security_groups: self.config.security_groups.clone(),
                    assign_public_ip: self.config.assign_public_ip.as_str().to_string(),
                },
            },
            overrides: TaskOverride {
                container_overrides: vec![ContainerOverride {
                    name: self.config.container.clone(),
                    environment,
                }],
            },
            enable_execute_command: false,
        }
    }

    /// Start one agent task for `room`
    pub async fn launch(
        &self,
        room: &str,
        join_url: &str,
        credential: &str,
        extra_env: &[(String, String)],
    ) -> Result<TaskHandle> {
        self.validate_placement()?;

        let request = self.build_request(room, join_url, credential, extra_env);
        let response = self.backend.run_task(&request).await.map_err(|e| match e {
            SwitchboardError::Launch(launch) => SwitchboardError::Launch(launch),
            other => SwitchboardError::Launch(LaunchError::Rejected {
                reason: other.to_string(),
            }),
        })?;

        if !response.failures.is_empty() {
            return Err(LaunchError::Failures {
                failures: response.failures.iter().map(ToString::to_string).collect(),
            }
            .into());
        }

        let handle = response
            .tasks
            .into_iter()
            .next()
            .and_then(|task| task.task_arn)
            .map(TaskHandle::new)
            .ok_or(LaunchError::NoTasks)?;

        info!(room = %room, task = %handle, "RunTask ok");

        if let Some(timeout) = self.config.wait_for_running {
            match self.await_running(&handle, timeout).await {
                RunState::Running => {}
                RunState::Pending { last_status } => warn!(
                    task = %handle,
                    last_status = ?last_status,
                    "Timed out waiting for RUNNING"
                ),
                RunState::BackendError(reason) => warn!(
                    task = %handle,
                    "Task did not reach RUNNING: {}", reason
                ),
            }
        }

        Ok(handle)
    }

    /// Poll the backend until the task is RUNNING or `timeout` elapses
    ///
    /// Never fails: a timeout is `Pending`, and describe errors are retried
    /// until the deadline. `BackendError` means the last observation was an
    /// error, or the task stopped before it ever ran. A describe call still
    /// outstanding at the deadline is abandoned.
    pub async fn await_running(&self, handle: &TaskHandle, timeout: Duration) -> RunState {
        let deadline = Instant::now() + timeout;
        let mut last_status: Option<String> = None;
        let mut last_error: Option<String> = None;

        loop {
            let describe = self.backend.describe_task(&self.config.cluster, handle);
            let Ok(observed) = tokio::time::timeout_at(deadline, describe).await else {
                debug!(task = %handle, "describe_tasks still outstanding at deadline");
                break;
            };

            match observed {
                Ok(Some(task)) => {
                    last_error = None;
                    match task.last_status.as_deref() {
                        Some(STATUS_RUNNING) => {
                            info!(task = %handle, "Task is RUNNING");
                            return RunState::Running;
                        }
                        Some(STATUS_STOPPED) => {
                            let reason = task
                                .stopped_reason
                                .unwrap_or_else(|| "no reason given".to_string());
                            return RunState::BackendError(format!(
                                "task stopped before running: {}",
                                reason
                            ));
                        }
                        status => {
                            debug!(task = %handle, status = ?status, "Task not running yet");
                            last_status = status.map(str::to_string);
                        }
                    }
                }
                Ok(None) => {
                    debug!(task = %handle, "Task not visible to backend yet");
                }
                Err(e) => {
                    warn!(task = %handle, "describe_tasks error: {}", e);
                    last_error = Some(e.to_string());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.config.describe_interval.min(deadline - now)).await;
        }

        match last_error {
            Some(error) => RunState::BackendError(error),
            None => RunState::Pending { last_status },
        }
    }

    /// Ask the backend to stop a task; failures are logged, never returned
    pub async fn stop(&self, handle: &TaskHandle, reason: &str) {
        match self
            .backend
            .stop_task(&self.config.cluster, handle, reason)
            .await
        {
            Ok(()) => info!(task = %handle, reason = %reason, "StopTask sent"),
            Err(e) => warn!(task = %handle, "StopTask error: {}", e),
        }
    }
}

fn env_pair(name: &str, value: &str) -> KeyValuePair {
    KeyValuePair {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{BackendCall, RecordingBackend};
    use super::*;

    fn placed_config() -> LauncherConfig {
        LauncherConfig {
            subnets: vec!["subnet-a".into()],
            security_groups: vec!["sg-1".into()],
            passthrough_env: vec![("DEEPGRAM_API_KEY".into(), "dg".into())],
            ..LauncherConfig::default()
        }
    }

    #[tokio::test]
    async fn test_launch_without_subnets_never_calls_backend() {
        let backend = Arc::new(RecordingBackend::new());
        let launcher = TaskLauncher::new(
            backend.clone(),
            LauncherConfig {
                security_groups: vec!["sg-1".into()],
                ..LauncherConfig::default()
            },
        );

        let err = launcher.launch("r1", "wss://x", "tok", &[]).await.unwrap_err();
        assert!(err.is_config());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_launch_without_security_groups_is_config_error() {
        let backend = Arc::new(RecordingBackend::new());
        let launcher = TaskLauncher::new(
            backend.clone(),
            LauncherConfig {
                subnets: vec!["subnet-a".into()],
                ..LauncherConfig::default()
            },
        );

        let err = launcher.launch("r1", "wss://x", "tok", &[]).await.unwrap_err();
        assert!(err.to_string().contains("SECGRPS_CSV"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_launch_builds_overrides() {
        let backend = Arc::new(RecordingBackend::new());
        let launcher = TaskLauncher::new(backend.clone(), placed_config());

        let extra = vec![("EXTRA".to_string(), "1".to_string())];
        let handle = launcher.launch("r1", "wss://x", "tok", &extra).await.unwrap();
        assert_eq!(handle.as_str(), "arn:task/r1");

        let requests = backend.run_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.count, 1);
        assert_eq!(request.capacity_provider_strategy[0].capacity_provider, "FARGATE_SPOT");
        assert_eq!(
            request.network_configuration.awsvpc_configuration.assign_public_ip,
            "ENABLED"
        );

        let names: Vec<&str> = request
            .environment("agent")
            .unwrap()
            .iter()
            .map(|kv| kv.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["ROOM_NAME", "LIVEKIT_URL", "LIVEKIT_TOKEN", "DEEPGRAM_API_KEY", "EXTRA"]
        );
    }

    #[tokio::test]
    async fn test_launch_reports_failures() {
        let backend = Arc::new(RecordingBackend::new());
        backend.respond_with(TasksResponse {
            tasks: Vec::new(),
            failures: vec![types::Failure {
                arn: None,
                reason: Some("RESOURCE:ENI".into()),
                detail: None,
            }],
        });
        let launcher = TaskLauncher::new(backend, placed_config());

        let err = launcher.launch("r1", "wss://x", "tok", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::Launch(LaunchError::Failures { ref failures }) if failures == &["RESOURCE:ENI"]
        ));
    }

    #[tokio::test]
    async fn test_launch_with_zero_tasks() {
        let backend = Arc::new(RecordingBackend::new());
        backend.respond_with(TasksResponse::default());
        let launcher = TaskLauncher::new(backend, placed_config());

        let err = launcher.launch("r1", "wss://x", "tok", &[]).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Launch(LaunchError::NoTasks)));
    }

    #[tokio::test]
    async fn test_backend_rejection_is_distinct_from_no_tasks() {
        let backend = Arc::new(RecordingBackend::new());
        backend.reject_runs("ThrottlingException: Rate exceeded");
        let launcher = TaskLauncher::new(backend, placed_config());

        let err = launcher.launch("r1", "wss://x", "tok", &[]).await.unwrap_err();
        match err {
            SwitchboardError::Launch(LaunchError::Rejected { reason }) => {
                assert!(reason.contains("ThrottlingException"))
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_running_observes_running() {
        let backend = Arc::new(RecordingBackend::new());
        backend.script_statuses(&["PROVISIONING", "PENDING", "RUNNING"]);
        let launcher = TaskLauncher::new(backend.clone(), placed_config());

        let state = launcher
            .await_running(&TaskHandle::new("arn:task/r1"), Duration::from_secs(30))
            .await;
        assert_eq!(state, RunState::Running);
        assert_eq!(backend.describe_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_running_times_out_as_pending() {
        let backend = Arc::new(RecordingBackend::new());
        backend.script_statuses(&["PENDING"]);
        let launcher = TaskLauncher::new(backend.clone(), placed_config());

        let started = Instant::now();
        let state = launcher
            .await_running(&TaskHandle::new("arn:task/r1"), Duration::from_secs(5))
            .await;
        assert_eq!(
            state,
            RunState::Pending {
                last_status: Some("PENDING".into())
            }
        );
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        // t = 0, 2, 4, 5
        assert_eq!(backend.describe_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_running_reports_backend_error() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_describes("AccessDeniedException");
        let launcher = TaskLauncher::new(backend, placed_config());

        let state = launcher
            .await_running(&TaskHandle::new("arn:task/r1"), Duration::from_secs(3))
            .await;
        assert!(matches!(state, RunState::BackendError(ref e) if e.contains("AccessDenied")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_running_deadline_bounds_slow_describe() {
        let backend = Arc::new(RecordingBackend::new());
        backend.script_statuses(&["PENDING"]);
        backend.delay_describes(Duration::from_secs(30));
        let launcher = TaskLauncher::new(backend.clone(), placed_config());

        let started = Instant::now();
        let state = launcher
            .await_running(&TaskHandle::new("arn:task/r1"), Duration::from_secs(5))
            .await;
        assert_eq!(state, RunState::Pending { last_status: None });
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(backend.describe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_running_stopped_task() {
        let backend = Arc::new(RecordingBackend::new());
        backend.script_statuses(&["PENDING", "STOPPED"]);
        let launcher = TaskLauncher::new(backend, placed_config());

        let state = launcher
            .await_running(&TaskHandle::new("arn:task/r1"), Duration::from_secs(30))
            .await;
        assert!(matches!(state, RunState::BackendError(ref e) if e.contains("stopped")));
    }

    #[tokio::test]
    async fn test_stop_swallows_errors() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_stops("InvalidParameterException");
        let launcher = TaskLauncher::new(backend.clone(), placed_config());

        launcher.stop(&TaskHandle::new("arn:task/r1"), "room_ended").await;
        assert_eq!(
            backend.calls(),
            vec![BackendCall::Stop {
                task: "arn:task/r1".into(),
                reason: "room_ended".into()
            }]
        );
    }
}
