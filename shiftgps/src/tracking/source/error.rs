//! Error types for position sources.

use std::time::Duration;

use thiserror::Error;

/// Failures of the position source API itself.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The OS refused to open a location subscription.
    #[error("Failed to open location subscription: {0}")]
    SubscribeFailed(String),

    /// A one-shot fix did not arrive in time.
    #[error("No fix within {0:?}")]
    Timeout(Duration),

    /// The location subsystem cannot answer right now.
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// A replay trace line could not be parsed.
    #[error("Invalid trace at line {line}: {reason}")]
    InvalidTrace { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An error payload delivered on the stream in place of a fix.
///
/// Non-fatal: the stream stays open and silence that follows is the health
/// monitor's concern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Location services are disabled")]
    ServicesDisabled,

    #[error("Location permission was revoked")]
    PermissionRevoked,

    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

impl PositionError {
    /// Parse the error code used in replay traces and host bridges.
    pub fn from_code(code: &str) -> Self {
        match code {
            "services_disabled" => PositionError::ServicesDisabled,
            "permission_revoked" => PositionError::PermissionRevoked,
            other => PositionError::Unavailable(other.to_string()),
        }
    }
}
