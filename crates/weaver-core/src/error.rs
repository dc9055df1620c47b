//! Unified error types for the weaver core.
//!
//! Runtime-level errors (configuration, storage) are defined in
//! weaver-runtime; this module only covers the transport seam.

use thiserror::Error;

/// Errors surfaced by a [`Transport`](crate::transport::Transport)
/// implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The session could not be established.
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The session is not open.
    #[error("transport is not connected")]
    NotConnected,

    /// A message could not be delivered.
    #[error("failed to send message to {jid}: {reason}")]
    SendFailed {
        /// Destination chat.
        jid: String,
        /// Reason for failure.
        reason: String,
    },

    /// Group metadata could not be fetched.
    #[error("failed to fetch metadata for group {jid}: {reason}")]
    GroupMetadata {
        /// The group chat id.
        jid: String,
        /// Reason for failure.
        reason: String,
    },

    /// Media content could not be downloaded.
    #[error("media download failed: {0}")]
    Download(String),

    /// The pairing-code request was rejected.
    #[error("pairing code request failed: {0}")]
    Pairing(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
