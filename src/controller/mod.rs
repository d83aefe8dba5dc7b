//! Assignment controller
//!
//! Ties the pieces together:
//! - webhook handling: claim rooms on start, release them on end
//! - `/assign` long-poll: hand queued rooms to pooled workers with a fresh
//!   join credential
//! - direct mode: launch one task per room and stop it when the room ends
//!
//! ## Direct-mode compensation
//!
//! The claim is taken before the backend call so concurrent duplicates see
//! it. If the launch fails the claim is released again, so the next start
//! event for the room can retry. If the room ends while the launch is in
//! flight, the new task is stopped as soon as its handle comes back. That
//! holds even if the room has started again meanwhile: the launch only
//! attaches to the claim generation it took.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::auth::{agent_identity, JoinTokenIssuer};
use crate::config::Mode;
use crate::launcher::{TaskHandle, TaskLauncher};
use crate::queue::{ClaimInfo, ClaimOutcome, EnqueueOutcome, RoomQueue};
use crate::types::{Result, SwitchboardError};
use crate::webhook::{parse_event, RoomEvent};

/// Reason passed to the backend when a room's task is stopped
pub const STOP_REASON: &str = "room_ended";
/// Reason passed to the backend when an expired claim's task is stopped
pub const EXPIRED_REASON: &str = "claim_expired";

/// Longest pause between claim sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Controller settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub mode: Mode,
    /// Platform URL handed to agents
    pub livekit_url: String,
    /// Lifetime of minted join credentials
    pub token_ttl: Duration,
    /// Long-poll wait budget for `/assign`
    pub assign_timeout: Duration,
    /// Queue re-check interval while long-polling
    pub assign_poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Pool,
            livekit_url: String::new(),
            token_ttl: Duration::from_secs(900),
            assign_timeout: Duration::from_secs(25),
            assign_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Join parameters handed to a pooled worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub room: String,
    pub livekit_url: String,
    pub livekit_token: String,
}

/// What a webhook did, serialized as the response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum WebhookOutcome {
    Queued {
        room: String,
        /// Queue depth including this job
        queue: usize,
    },
    AlreadyQueued {
        room: String,
    },
    Launched {
        room: String,
        #[serde(rename = "taskArn")]
        task: TaskHandle,
    },
    AlreadyRunning {
        room: String,
        #[serde(rename = "taskArn", skip_serializing_if = "Option::is_none")]
        task: Option<TaskHandle>,
    },
    LaunchFailed {
        room: String,
        error: String,
        #[serde(skip)]
        http_status: StatusCode,
    },
    Ended {
        room: String,
    },
    Stopped {
        room: String,
        #[serde(rename = "taskArn")]
        task: TaskHandle,
    },
    EndedNoAgent {
        room: String,
    },
    Ignored {
        event: Option<String>,
        room: Option<String>,
    },
}

impl WebhookOutcome {
    /// HTTP status for the webhook response
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::LaunchFailed { http_status, .. } => *http_status,
            _ => StatusCode::OK,
        }
    }
}

/// Operator view of controller state
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub mode: &'static str,
    /// Jobs waiting for a worker
    pub queue: usize,
    pub pending: Vec<String>,
    pub claims: Vec<ClaimInfo>,
}

/// Room-to-agent assignment controller
pub struct Controller {
    config: ControllerConfig,
    queue: Arc<RoomQueue>,
    issuer: JoinTokenIssuer,
    launcher: Option<TaskLauncher>,
}

impl Controller {
    /// Create a controller; direct mode requires a launcher
    pub fn new(
        config: ControllerConfig,
        queue: Arc<RoomQueue>,
        issuer: JoinTokenIssuer,
        launcher: Option<TaskLauncher>,
    ) -> Result<Self> {
        if config.mode == Mode::Direct && launcher.is_none() {
            return Err(SwitchboardError::Config(
                "direct mode requires a task launcher".into(),
            ));
        }
        if config.assign_poll_interval.is_zero() {
            return Err(SwitchboardError::Config(
                "assign poll interval must be greater than zero".into(),
            ));
        }

        Ok(Self {
            config,
            queue,
            issuer,
            launcher,
        })
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn queue(&self) -> &Arc<RoomQueue> {
        &self.queue
    }

    /// Handle one raw webhook body
    pub async fn handle_webhook(&self, body: &[u8]) -> WebhookOutcome {
        match parse_event(body) {
            RoomEvent::Started { room } => match self.config.mode {
                Mode::Pool => self.enqueue_room(room),
                Mode::Direct => self.launch_room(room).await,
            },
            RoomEvent::Ended { room } => match self.config.mode {
                Mode::Pool => self.release_room(room),
                Mode::Direct => self.stop_room(room).await,
            },
            RoomEvent::Other { event, room } => {
                debug!(event = ?event, room = ?room, "Ignoring webhook event");
                WebhookOutcome::Ignored { event, room }
            }
        }
    }

    fn enqueue_room(&self, room: String) -> WebhookOutcome {
        match self.queue.claim_and_enqueue(&room) {
            EnqueueOutcome::Queued { depth } => {
                info!(room = %room, depth = depth, "Room queued");
                WebhookOutcome::Queued { room, queue: depth }
            }
            EnqueueOutcome::AlreadyClaimed => {
                info!(room = %room, "Room already claimed");
                WebhookOutcome::AlreadyQueued { room }
            }
        }
    }

    fn release_room(&self, room: String) -> WebhookOutcome {
        match self.queue.clear_claim(&room) {
            Some(_) => {
                info!(room = %room, "Room ended, claim cleared");
                WebhookOutcome::Ended { room }
            }
            None => {
                info!(room = %room, "Room ended with no claim");
                WebhookOutcome::EndedNoAgent { room }
            }
        }
    }

    async fn launch_room(&self, room: String) -> WebhookOutcome {
        let Some(launcher) = &self.launcher else {
            return self.launch_failed(room, SwitchboardError::Config("no task launcher".into()));
        };

        let generation = match self.queue.try_claim(&room) {
            ClaimOutcome::Claimed { generation } => generation,
            ClaimOutcome::AlreadyClaimed { task } => {
                info!(room = %room, task = ?task, "Agent already running");
                return WebhookOutcome::AlreadyRunning { room, task };
            }
        };

        let identity = agent_identity(&room);
        let credential = match self.issuer.issue(&room, &identity, self.config.token_ttl) {
            Ok(credential) => credential,
            Err(e) => {
                self.queue.clear_claim(&room);
                return self.launch_failed(room, e);
            }
        };

        let handle = match launcher
            .launch(&room, &self.config.livekit_url, &credential.token, &[])
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.queue.clear_claim(&room);
                return self.launch_failed(room, e);
            }
        };

        if self.queue.attach_task(&room, generation, handle.clone()) {
            info!(room = %room, task = %handle, "Agent launched");
            WebhookOutcome::Launched { room, task: handle }
        } else {
            warn!(room = %room, task = %handle, "Room ended during launch, stopping task");
            launcher.stop(&handle, STOP_REASON).await;
            WebhookOutcome::Stopped { room, task: handle }
        }
    }

    async fn stop_room(&self, room: String) -> WebhookOutcome {
        match self.queue.clear_claim(&room) {
            Some(claim) => match (claim.task, &self.launcher) {
                (Some(task), Some(launcher)) => {
                    launcher.stop(&task, STOP_REASON).await;
                    info!(room = %room, task = %task, "Room ended, agent stopped");
                    WebhookOutcome::Stopped { room, task }
                }
                // Launch still in flight; it stops its own task once it sees the claim gone
                _ => {
                    info!(room = %room, "Room ended before launch completed");
                    WebhookOutcome::Ended { room }
                }
            },
            None => {
                info!(room = %room, "Room ended with no agent");
                WebhookOutcome::EndedNoAgent { room }
            }
        }
    }

    fn launch_failed(&self, room: String, err: SwitchboardError) -> WebhookOutcome {
        error!(room = %room, "Launch failed: {}", err);
        WebhookOutcome::LaunchFailed {
            room,
            error: err.to_string(),
            http_status: err.status_code(),
        }
    }

    /// Wait up to the configured budget for a queued room
    ///
    /// Returns `Ok(None)` when nothing arrived in time. Dropping the future
    /// abandons the wait without consuming a job.
    pub async fn assign(&self) -> Result<Option<Assignment>> {
        if self.config.mode != Mode::Pool {
            return Err(SwitchboardError::BadRequest(
                "assignments are only served in pool mode".into(),
            ));
        }

        let deadline = Instant::now() + self.config.assign_timeout;
        loop {
            if let Some(job) = self.queue.try_dequeue() {
                let identity = agent_identity(&job.room);
                let credential = match self.issuer.issue(&job.room, &identity, self.config.token_ttl)
                {
                    Ok(credential) => credential,
                    Err(e) => {
                        self.queue.requeue_front(job);
                        return Err(e);
                    }
                };

                info!(
                    room = %job.room,
                    identity = %identity,
                    waited_ms = (chrono::Utc::now() - job.enqueued_at).num_milliseconds(),
                    "Room assigned"
                );
                return Ok(Some(Assignment {
                    room: job.room,
                    livekit_url: self.config.livekit_url.clone(),
                    livekit_token: credential.token,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.config.assign_poll_interval.min(deadline - now)).await;
        }
    }

    /// Drop claims older than `ttl` and stop any task they launched
    ///
    /// Returns the number of swept claims.
    pub async fn sweep_expired_claims(&self, ttl: Duration) -> usize {
        let swept = self.queue.sweep_expired(ttl);
        for (room, claim) in &swept {
            match (&claim.task, &self.launcher) {
                (Some(task), Some(launcher)) => {
                    warn!(
                        room = %room,
                        task = %task,
                        "Claim expired without a room end event, stopping task"
                    );
                    launcher.stop(task, EXPIRED_REASON).await;
                }
                _ => warn!(room = %room, "Claim expired without a room end event"),
            }
        }
        swept.len()
    }

    pub fn status(&self) -> StatusReport {
        let snapshot = self.queue.snapshot();
        StatusReport {
            mode: self.config.mode.as_str(),
            queue: snapshot.pending.len(),
            pending: snapshot.pending,
            claims: snapshot.claims,
        }
    }
}

/// Spawn a background task that expires stale claims
///
/// Runs every `min(ttl, 60s)` until the returned handle is aborted.
pub fn spawn_claim_sweeper(controller: Arc<Controller>, ttl: Duration) -> JoinHandle<()> {
    let interval = ttl.min(MAX_SWEEP_INTERVAL);
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            controller.sweep_expired_claims(ttl).await;
            debug!(
                "Queue stats: {} pending, {} claimed",
                controller.queue.depth(),
                controller.queue.claim_count()
            );
        }
    });
    info!(ttl_secs = ttl.as_secs(), "Claim sweeper started");
    handle
}
