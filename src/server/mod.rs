//! HTTP server for Switchboard
//!
//! Routes:
//! - /healthz, /health - liveness probe
//! - /version - build information
//! - /status - queue and claim snapshot
//! - /webhook, /livekit/webhook - room lifecycle events
//! - /assign - long-poll for pooled workers

pub mod http;

pub use http::{run, serve, AppState};
