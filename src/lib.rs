//! Switchboard - assigns voice agents to rooms
//!
//! Listens for room lifecycle webhooks from the real-time platform and makes
//! sure every live room gets exactly one agent.
//!
//! ## Modes
//!
//! - **Pool**: started rooms are queued; generic workers long-poll `/assign`
//!   and receive the room name, platform URL and a fresh join credential
//! - **Direct**: every started room launches a dedicated task on the
//!   container orchestrator, which is stopped again when the room ends
//!
//! State is in memory and owned by a single controller instance.

pub mod auth;
pub mod config;
pub mod controller;
pub mod launcher;
pub mod logging;
pub mod queue;
pub mod routes;
pub mod server;
pub mod types;
pub mod webhook;
pub mod worker;

pub use config::Args;
pub use controller::{Assignment, Controller, ControllerConfig, WebhookOutcome};
pub use server::{run, serve, AppState};
pub use types::{Result, SwitchboardError};
