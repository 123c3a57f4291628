//! # Client Error Types
//!
//! Unified error handling for the provisioning client library and CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::progress::steps::UnknownStepError;

/// Client operation result type
pub type ClientResult<T> = Result<T, ClientError>;

/// Error types for client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, DNS or connection failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Anti-forgery credential missing, expired or rejected (HTTP 401/419)
    #[error("Authentication failed: {status} - {message}")]
    Auth { status: u16, message: String },

    /// Non-2xx response or a body that could not be understood
    #[error("Server error: {} - {message}", display_status(.status))]
    Server { status: Option<u16>, message: String },

    #[error(transparent)]
    UnknownStep(#[from] UnknownStepError),

    /// The server explicitly reported the provisioning job as failed
    #[error("Provisioning job failed: {message}")]
    JobFailed { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON serialization/deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "n/a".to_string(), |s| s.to_string())
}

impl ClientError {
    /// Create a server error from an HTTP status and body text
    pub fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Map a transport-level reqwest failure.
    ///
    /// Decode failures surface as server errors since the server answered
    /// with something that is not the documented payload.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::config_error(format!("Invalid request: {}", error));
        }
        if error.is_decode() {
            return Self::server(
                error.status().map(|s| s.as_u16()),
                format!("Malformed response body: {}", error),
            );
        }
        if let Some(status) = error.status() {
            return Self::server(Some(status.as_u16()), error.to_string());
        }
        Self::Transport(error.to_string())
    }

    /// Classify this error for progress snapshots
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ClientError::Transport(_) | ClientError::Io(_) => FailureKind::Transport,
            // After construction only a malformed credential surfaces as Config
            ClientError::Auth { .. } | ClientError::Config(_) => FailureKind::Auth,
            ClientError::JobFailed { .. } => FailureKind::JobFailed,
            ClientError::UnknownStep(_) => FailureKind::UnknownStep,
            ClientError::Server { .. }
            | ClientError::Serialization(_)
            | ClientError::InvalidInput(_) => FailureKind::Server,
        }
    }

    /// Check if error is recoverable by a user-initiated retry
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Server { .. } => true,
            ClientError::JobFailed { .. } => true,
            // Needs a fresh credential first
            ClientError::Auth { .. } => false,
            _ => false,
        }
    }
}

/// Failure categories surfaced on a progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Auth,
    Server,
    UnknownStep,
    JobFailed,
}

impl FailureKind {
    /// Human-readable guidance shown next to a failure
    #[must_use]
    pub fn guidance(&self) -> &'static str {
        match self {
            FailureKind::Transport => {
                "Could not reach the server. Check your connection and retry."
            }
            FailureKind::Auth => "Your session has expired. Reload the page and try again.",
            FailureKind::Server => "The server returned an unexpected response. Please retry.",
            FailureKind::UnknownStep => {
                "The server reported an unrecognized step. Progress display may be out of date."
            }
            FailureKind::JobFailed => "Tenant creation failed. It is safe to retry now.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport_error"),
            Self::Auth => write!(f, "auth_error"),
            Self::Server => write!(f, "server_error"),
            Self::UnknownStep => write!(f, "unknown_step"),
            Self::JobFailed => write!(f, "job_failed"),
        }
    }
}
