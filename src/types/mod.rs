//! Shared types

pub mod error;

pub use error::{LaunchError, Result, SwitchboardError};
