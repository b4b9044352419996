//! Error types for pixel-canvas-core
//!
//! This module provides the error taxonomy shared by the Event Store, Canvas
//! Cache, Pixel Repository, Broadcast Engine, Session Manager and User
//! Directory.

use thiserror::Error;

/// Canvas error type
#[derive(Debug, Error)]
pub enum Error {
    /// A draw request or query violated a data-model invariant (out-of-range
    /// coordinate, malformed color, invalid bounds).
    #[error("validation error: {0}")]
    Validation(String),

    /// A client frame could not be decoded as a recognized message.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The Event Store failed to append or query.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A user record collided with an existing `userId`.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A session's transport failed to send or was already closed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The session, user, or record addressed by this call does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A condition that should abort the process (e.g. database
    /// unreachable at startup).
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Create a validation error
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a decoding error
    #[must_use]
    pub fn decoding(msg: impl Into<String>) -> Self {
        Self::Decoding(msg.into())
    }

    /// Create a persistence error
    #[must_use]
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a conflict error
    #[must_use]
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether the session should stay open after this error (everything
    /// except transport failures, which imply the connection is gone).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::Fatal(_))
    }

    /// Stable error code used on `ERROR` frames and HTTP error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Decoding(_) => "decoding_error",
            Self::Persistence(_) => "persistence_error",
            Self::Conflict(_) => "conflict",
            Self::Transport(_) => "transport_error",
            Self::NotFound(_) => "not_found",
            Self::Fatal(_) => "fatal_error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result type alias for canvas operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = Error::validation("x out of range");
        assert_eq!(err.code(), "validation_error");

        let err = Error::Conflict("dup".into());
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::validation("bad color").is_recoverable());
        assert!(Error::decoding("bad json").is_recoverable());
        assert!(!Error::transport("peer closed").is_recoverable());
        assert!(!Error::Fatal("db unreachable".into()).is_recoverable());
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::persistence("disk full");
        assert_eq!(err.code(), "persistence_error");

        let err = Error::transport("send failed");
        assert_eq!(err.code(), "transport_error");
    }

    #[test]
    fn test_error_display() {
        let err = Error::validation("coordinate out of range");
        let msg = err.to_string();
        assert!(msg.contains("coordinate out of range"));
    }

    #[test]
    fn test_from_serde_error() {
        let result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        let err: Error = result.unwrap_err().into();
        assert_eq!(err.code(), "decoding_error");
    }
}
