//! In-process backend fake for launcher and controller tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::types::{RunTaskRequest, Task, TaskHandle, TasksResponse};
use super::TaskBackend;
use crate::types::{Result, SwitchboardError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Run { room: String },
    Describe { task: String },
    Stop { task: String, reason: String },
}

#[derive(Default)]
struct Inner {
    calls: Vec<BackendCall>,
    run_requests: Vec<RunTaskRequest>,
    run_response: Option<TasksResponse>,
    run_error: Option<String>,
    statuses: VecDeque<String>,
    describe_error: Option<String>,
    stop_error: Option<String>,
    numbered_arns: bool,
    run_delays: VecDeque<Duration>,
    describe_delay: Option<Duration>,
}

/// Records every call; answers RunTask with `arn:task/<room>` unless told otherwise
#[derive(Default)]
pub struct RecordingBackend {
    inner: Mutex<Inner>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn run_requests(&self) -> Vec<RunTaskRequest> {
        self.inner.lock().unwrap().run_requests.clone()
    }

    pub fn run_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Run { .. }))
            .count()
    }

    pub fn describe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Describe { .. }))
            .count()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Stop { task, .. } => Some(task),
                _ => None,
            })
            .collect()
    }

    /// Fixed RunTask response
    pub fn respond_with(&self, response: TasksResponse) {
        self.inner.lock().unwrap().run_response = Some(response);
    }

    pub fn reject_runs(&self, reason: &str) {
        self.inner.lock().unwrap().run_error = Some(reason.to_string());
    }

    /// Statuses returned by successive describes; the last one repeats
    pub fn script_statuses(&self, statuses: &[&str]) {
        self.inner.lock().unwrap().statuses = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_describes(&self, reason: &str) {
        self.inner.lock().unwrap().describe_error = Some(reason.to_string());
    }

    pub fn fail_stops(&self, reason: &str) {
        self.inner.lock().unwrap().stop_error = Some(reason.to_string());
    }

    /// Answer RunTask with `arn:task/<room>/<n>`, `n` counting runs from 0
    pub fn number_tasks(&self) {
        self.inner.lock().unwrap().numbered_arns = true;
    }

    /// Delays for successive RunTask calls; later calls answer at once
    pub fn delay_runs(&self, delays: &[Duration]) {
        self.inner.lock().unwrap().run_delays = delays.iter().copied().collect();
    }

    pub fn delay_describes(&self, delay: Duration) {
        self.inner.lock().unwrap().describe_delay = Some(delay);
    }
}

#[async_trait]
impl TaskBackend for RecordingBackend {
    async fn run_task(&self, request: &RunTaskRequest) -> Result<TasksResponse> {
        let (result, delay) = {
            let mut inner = self.inner.lock().unwrap();
            let room = request
                .environment(&request.overrides.container_overrides[0].name)
                .and_then(|env| env.iter().find(|kv| kv.name == "ROOM_NAME"))
                .map(|kv| kv.value.clone())
                .unwrap_or_default();
            inner.calls.push(BackendCall::Run { room: room.clone() });
            inner.run_requests.push(request.clone());
            let run_index = inner.run_requests.len() - 1;

            let result = if let Some(reason) = &inner.run_error {
                Err(SwitchboardError::Backend(reason.clone()))
            } else if let Some(response) = &inner.run_response {
                Ok(response.clone())
            } else {
                let arn = if inner.numbered_arns {
                    format!("arn:task/{}/{}", room, run_index)
                } else {
                    format!("arn:task/{}", room)
                };
                Ok(TasksResponse {
                    tasks: vec![Task {
                        task_arn: Some(arn),
                        last_status: Some("PROVISIONING".into()),
                        stopped_reason: None,
                    }],
                    failures: Vec::new(),
                })
            };
            (result, inner.run_delays.pop_front())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn describe_task(&self, _cluster: &str, task: &TaskHandle) -> Result<Option<Task>> {
        let (result, delay) = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(BackendCall::Describe {
                task: task.to_string(),
            });

            let result = if let Some(reason) = &inner.describe_error {
                Err(SwitchboardError::Backend(reason.clone()))
            } else {
                let status = if inner.statuses.len() > 1 {
                    inner.statuses.pop_front()
                } else {
                    inner.statuses.front().cloned()
                }
                .unwrap_or_else(|| "RUNNING".to_string());

                Ok(Some(Task {
                    task_arn: Some(task.to_string()),
                    last_status: Some(status),
                    stopped_reason: None,
                }))
            };
            (result, inner.describe_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn stop_task(&self, _cluster: &str, task: &TaskHandle, reason: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(BackendCall::Stop {
            task: task.to_string(),
            reason: reason.to_string(),
        });
        match &inner.stop_error {
            Some(reason) => Err(SwitchboardError::Backend(reason.clone())),
            None => Ok(()),
        }
    }
}
