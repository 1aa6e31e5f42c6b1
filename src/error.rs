//! Error types for the relay
//!
//! Fatal errors tear down a connection; protocol-level failures (bad
//! payloads, unknown targets) are wire responses, not Rust errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal to the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound queue at capacity; the frame was dropped (recoverable)
    #[error("outbound queue full, frame dropped")]
    QueueFull,

    /// Outbound queue already shut down by the owning connection
    #[error("outbound queue closed")]
    QueueClosed,

    /// An actor's mailbox is gone or it dropped the reply channel
    #[error("actor unavailable")]
    ActorGone,
}
