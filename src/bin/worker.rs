//! Switchboard Worker - pooled agent host
//!
//! Long-polls the controller for rooms and runs the agent program once per
//! room, one room at a time.
//!
//! Usage:
//!   switchboard-worker --controller-url http://switchboard:8080 --agent-command ./agent
//!
//! Environment variables:
//!   CONTROLLER_URL - Controller base URL (default: http://localhost:8080)
//!   WORKER_ID - Unique worker identifier (default: auto-generated UUID)
//!   POLL_BACKOFF_MS - Pause after an empty or failed poll (default: 1000)
//!   ASSIGN_REQUEST_TIMEOUT_MS - HTTP timeout for /assign (default: 35000)
//!   AGENT_COMMAND - Program run for each room
//!   AGENT_ARGS - Space-separated arguments for AGENT_COMMAND

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use switchboard::config::LogFormat;
use switchboard::logging;
use switchboard::worker::{AssignClient, CommandSession, PollLoop, PollLoopConfig};

#[derive(Parser, Debug)]
#[command(name = "switchboard-worker")]
#[command(about = "Pooled agent worker for Switchboard")]
#[command(version)]
struct Args {
    /// Controller base URL
    #[arg(long, env = "CONTROLLER_URL", default_value = "http://localhost:8080")]
    controller_url: String,

    /// Unique worker ID (auto-generated if not provided)
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,

    /// Pause after an empty or failed poll, in milliseconds
    #[arg(long, env = "POLL_BACKOFF_MS", default_value = "1000")]
    poll_backoff_ms: u64,

    /// HTTP timeout for /assign; must exceed the controller's wait budget
    #[arg(long, env = "ASSIGN_REQUEST_TIMEOUT_MS", default_value = "35000")]
    assign_request_timeout_ms: u64,

    /// Program run for each room
    #[arg(long, env = "AGENT_COMMAND")]
    agent_command: String,

    /// Arguments for the agent program
    #[arg(long, env = "AGENT_ARGS", value_delimiter = ' ', num_args = 0..)]
    agent_args: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, ignore_case = true, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    let config = PollLoopConfig {
        worker_id: args
            .worker_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        backoff: Duration::from_millis(args.poll_backoff_ms),
    };

    let client = match AssignClient::new(
        &args.controller_url,
        config.worker_id.clone(),
        Duration::from_millis(args.assign_request_timeout_ms),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create assign client: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting Switchboard worker {} (controller: {}, agent: {})",
        config.worker_id,
        client.assign_url(),
        args.agent_command
    );

    let agent_args: Vec<String> = args
        .agent_args
        .into_iter()
        .filter(|arg| !arg.is_empty())
        .collect();
    let poll = PollLoop::new(
        config,
        Arc::new(client),
        Arc::new(CommandSession::new(args.agent_command, agent_args)),
    );

    poll.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    })
    .await;

    info!("Worker shutting down");
}
