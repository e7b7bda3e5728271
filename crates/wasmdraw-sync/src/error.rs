//! Error taxonomy for the sync layer.

use thiserror::Error;

/// Sync errors.
///
/// None of these are fatal: the session handles each one at the boundary
/// where it occurs and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The transport endpoint could not be created (bad URL, unreachable host).
    #[error("Connection could not be constructed: {0}")]
    Construction(String),
    /// A send was attempted while the connection is not open.
    #[error("Not connected")]
    NotConnected,
    /// An inbound message did not match the expected tagged shape.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    /// An inbound message carried a `type` tag this client does not handle.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
