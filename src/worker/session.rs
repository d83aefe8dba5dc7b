//! Room sessions - what a worker does with an assignment

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::controller::Assignment;
use crate::types::{Result, SwitchboardError};

/// Runs one room session to completion
#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn run(&self, assignment: &Assignment) -> Result<()>;
}

/// Runs an external agent program once per room
///
/// The program sees `ROOM_NAME`, `LIVEKIT_URL` and `LIVEKIT_TOKEN` in its
/// environment, the same variables a directly launched task receives. It is
/// killed if the session future is dropped.
#[derive(Debug, Clone)]
pub struct CommandSession {
    program: String,
    args: Vec<String>,
}

impl CommandSession {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl SessionRunner for CommandSession {
    async fn run(&self, assignment: &Assignment) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .env("ROOM_NAME", &assignment.room)
            .env("LIVEKIT_URL", &assignment.livekit_url)
            .env("LIVEKIT_TOKEN", &assignment.livekit_token)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                SwitchboardError::Internal(format!("Failed to start {}: {}", self.program, e))
            })?;

        if status.success() {
            info!(room = %assignment.room, "Session finished");
        } else {
            warn!(room = %assignment.room, status = %status, "Session exited unsuccessfully");
        }
        Ok(())
    }
}
