//! Worker poll loop
//!
//! Pulls one assignment at a time and runs its session to completion before
//! asking again. Empty polls and failed polls both back off; nothing a single
//! poll returns ends the loop, only the shutdown signal does.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::client::AssignmentSource;
use super::session::SessionRunner;

/// Poll loop configuration
#[derive(Debug, Clone)]
pub struct PollLoopConfig {
    pub worker_id: String,
    /// Pause after an empty or failed poll
    pub backoff: Duration,
}

impl Default for PollLoopConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            backoff: Duration::from_millis(1000),
        }
    }
}

/// What one poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A session ran for this room
    Session { room: String },
    /// The controller had no work
    Idle,
    /// The poll itself failed
    Failed,
}

pub struct PollLoop {
    config: PollLoopConfig,
    source: Arc<dyn AssignmentSource>,
    runner: Arc<dyn SessionRunner>,
}

impl PollLoop {
    pub fn new(
        config: PollLoopConfig,
        source: Arc<dyn AssignmentSource>,
        runner: Arc<dyn SessionRunner>,
    ) -> Self {
        Self {
            config,
            source,
            runner,
        }
    }

    /// Poll once and run the session if there was one
    pub async fn poll_once(&self) -> PollOutcome {
        match self.source.next_assignment().await {
            Ok(Some(assignment)) => {
                info!(
                    worker = %self.config.worker_id,
                    room = %assignment.room,
                    "Got assignment"
                );
                if let Err(e) = self.runner.run(&assignment).await {
                    error!(room = %assignment.room, "Session failed: {}", e);
                }
                PollOutcome::Session {
                    room: assignment.room,
                }
            }
            Ok(None) => PollOutcome::Idle,
            Err(e) => {
                warn!(worker = %self.config.worker_id, "Assign poll failed: {}", e);
                PollOutcome::Failed
            }
        }
    }

    /// Poll until `shutdown` resolves
    ///
    /// A session still running at shutdown is dropped with the loop.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(worker = %self.config.worker_id, "Poll loop started");

        loop {
            let outcome = tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.poll_once() => outcome,
            };

            if outcome == PollOutcome::Idle || outcome == PollOutcome::Failed {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.config.backoff) => {}
                }
            }
        }

        info!(worker = %self.config.worker_id, "Poll loop stopped");
    }
}
