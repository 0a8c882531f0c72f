//! Error types for the chat server
//!
//! Defines application-level errors and outbound send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// Transport errors are fatal to the one connection they occur on and
/// never propagate to other sessions or the listener.
#[derive(Debug, Error)]
pub enum AppError {
    /// Line framing error (oversized line or socket failure while reading)
    #[error("Line framing error: {0}")]
    Lines(#[from] LinesCodecError),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Registry actor has shut down
    #[error("Registry unavailable")]
    RegistryClosed,
}

/// Outbound send errors
///
/// Occurs when writing to a connection whose writer has already gone away.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the outbound queue has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
