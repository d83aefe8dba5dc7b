//! Error types for Switchboard

use hyper::StatusCode;

/// Why the compute backend did not hand back a task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// The backend refused the request outright (throttling, bad task definition, ...)
    #[error("backend rejected run request: {reason}")]
    Rejected { reason: String },

    /// The backend accepted the call but reported per-task failures
    #[error("backend reported task failures: {}", .failures.join("; "))]
    Failures { failures: Vec<String> },

    /// The backend answered without any task
    #[error("backend returned no tasks")]
    NoTasks,
}

/// Main error type for Switchboard operations
#[derive(Debug, thiserror::Error)]
pub enum SwitchboardError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Launch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this failure happened before the backend was contacted
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for SwitchboardError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for SwitchboardError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for SwitchboardError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP server error: {}", err))
    }
}

impl From<reqwest::Error> for SwitchboardError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for SwitchboardError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Token(err.to_string())
    }
}

/// Result type alias for Switchboard operations
pub type Result<T> = std::result::Result<T, SwitchboardError>;
