//! Errors surfaced by `start` and `track`.

use std::fmt;

use trk_consumers::DispatchError;
use trk_trace::StatementError;

/// Every variant maps to exactly one HTTP status via [`CollectorError::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    /// Repository failure. The message is logged, not shown to clients.
    Storage(String),
    /// Collector bug (e.g. a value that failed to serialize). Logged, not shown.
    Internal(String),
    /// First failing consumer of a dispatch, reported verbatim.
    Consumer { status: u16, message: String },
}

impl CollectorError {
    pub fn status(&self) -> u16 {
        match self {
            CollectorError::Unauthorized(_) => 401,
            CollectorError::BadRequest(_) => 400,
            CollectorError::NotFound(_) => 404,
            CollectorError::Storage(_) | CollectorError::Internal(_) => 500,
            CollectorError::Consumer { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CollectorError::Unauthorized(m)
            | CollectorError::BadRequest(m)
            | CollectorError::NotFound(m)
            | CollectorError::Storage(m)
            | CollectorError::Internal(m) => m,
            CollectorError::Consumer { message, .. } => message,
        }
    }

    /// Message safe to return to a client.
    pub fn public_message(&self) -> &str {
        match self {
            CollectorError::Storage(_) => "Internal storage error",
            CollectorError::Internal(_) => "Internal error",
            other => other.message(),
        }
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.status())
    }
}

impl std::error::Error for CollectorError {}

impl From<anyhow::Error> for CollectorError {
    fn from(e: anyhow::Error) -> Self {
        CollectorError::Storage(format!("{e:#}"))
    }
}

impl From<StatementError> for CollectorError {
    fn from(e: StatementError) -> Self {
        CollectorError::BadRequest(e.to_string())
    }
}

impl From<DispatchError> for CollectorError {
    fn from(e: DispatchError) -> Self {
        CollectorError::Consumer {
            status: e.status,
            message: e.message,
        }
    }
}
