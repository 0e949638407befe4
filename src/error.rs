//! Error taxonomy for the sequencing engine and its HTTP adapters.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed or underspecified request. Nothing external was attempted.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("could not resolve address for stop {id} ({address}): {reason}")]
    Geocoding {
        id: String,
        address: String,
        reason: String,
    },

    #[error("trip optimization failed after {attempts} attempt(s): {reason}")]
    RemoteOptimization { attempts: u32, reason: String },

    /// Recovered locally by the planner; only surfaces as a warning.
    #[error("ordering oracle response rejected: {0}")]
    FallbackParse(String),

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Process(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used to pick a status code for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Client,
    Upstream,
    Cancelled,
    Internal,
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Geocoding { .. } => ErrorKind::Client,
            Error::RemoteOptimization { .. }
            | Error::FallbackParse(_)
            | Error::Http(_)
            | Error::Upstream { .. }
            | Error::MalformedResponse(_) => ErrorKind::Upstream,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Json(_) | Error::Io(_) | Error::Process(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status for the error body.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Geocoding { .. } => 422,
            Error::Cancelled => 499,
            _ => match self.kind() {
                ErrorKind::Upstream => 502,
                _ => 500,
            },
        }
    }
}

/// Error body returned to callers: `{ "error": ..., "details": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        let details = match err {
            Error::Geocoding { id, address, .. } => Some(format!("stop {id}: {address}")),
            Error::Upstream { message, .. } => Some(message.clone()),
            Error::RemoteOptimization { reason, .. } => Some(reason.clone()),
            _ => None,
        };

        Self {
            error: err.to_string(),
            details,
        }
    }
}
