//! Switchboard - room-to-agent assignment controller

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use switchboard::{
    auth::JoinTokenIssuer,
    config::{Args, Mode},
    controller::{spawn_claim_sweeper, Controller, ControllerConfig},
    launcher::{EcsBackend, TaskLauncher},
    logging,
    queue::RoomQueue,
    server::{self, AppState},
};

/// Per-request timeout for orchestrator calls
const BACKEND_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let livekit_url = args.livekit_url.clone().unwrap_or_default();
    let api_key = args.livekit_api_key.clone().unwrap_or_default();
    let api_secret = args.livekit_api_secret.clone().unwrap_or_default();

    info!("======================================");
    info!("  Switchboard");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", args.mode);
    info!("Platform: {}", livekit_url);
    info!("Token TTL: {}s", args.token_ttl_seconds);
    match args.mode {
        Mode::Pool => info!(
            "Assign wait: {}ms (poll every {}ms)",
            args.assign_timeout_ms, args.assign_poll_interval_ms
        ),
        Mode::Direct => {
            info!("Backend: {}", args.backend.endpoint());
            info!(
                "Cluster: {} / task definition: {}",
                args.backend.ecs_cluster, args.backend.agent_task_def
            );
        }
    }
    info!("======================================");

    let issuer = JoinTokenIssuer::new(api_key, &api_secret)?;

    let launcher = match args.mode {
        Mode::Direct => {
            let backend = EcsBackend::new(args.backend.endpoint(), BACKEND_REQUEST_TIMEOUT)?;
            Some(TaskLauncher::new(
                Arc::new(backend),
                args.backend.launcher_config(),
            ))
        }
        Mode::Pool => None,
    };

    let controller = Arc::new(Controller::new(
        ControllerConfig {
            mode: args.mode,
            livekit_url,
            token_ttl: args.token_ttl(),
            assign_timeout: args.assign_timeout(),
            assign_poll_interval: args.assign_poll_interval(),
        },
        Arc::new(RoomQueue::new()),
        issuer,
        launcher,
    )?);

    let sweeper = args
        .claim_ttl()
        .map(|ttl| spawn_claim_sweeper(Arc::clone(&controller), ttl));

    let state = Arc::new(AppState::new(controller));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    server::run(state, args.listen, shutdown).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("Switchboard stopped");
    Ok(())
}
