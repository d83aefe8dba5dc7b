//! Worker side of the assignment protocol
//!
//! A pooled worker long-polls the controller for a room, runs one session
//! for it, and polls again:
//! - `client` - `/assign` HTTP client and the [`AssignmentSource`] seam
//! - `session` - [`SessionRunner`] and the external-command runner
//! - `poll` - the loop tying them together

pub mod client;
pub mod poll;
pub mod session;

pub use client::{AssignClient, AssignmentSource};
pub use poll::{PollLoop, PollLoopConfig, PollOutcome};
pub use session::{CommandSession, SessionRunner};
