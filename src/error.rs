//! Error types
//!
//! Library-level errors for the messaging session, the UI channel and the
//! per-connection workflow. The binary edge wraps these in `anyhow`.

use serde::Serialize;
use thiserror::Error;

/// Errors raised by a [`MessagingSession`](crate::session::MessagingSession).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The automation bridge answered with a non-success status.
    #[error("bridge returned {status}: {body}")]
    Bridge { status: u16, body: String },

    /// The messaging client itself reported a failure (relayed verbatim).
    #[error("{0}")]
    Client(String),

    /// Transport-level failure talking to the bridge.
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with something we could not decode.
    #[error("invalid bridge response: {0}")]
    Decode(String),

    /// The underlying client disconnected or logged out.
    #[error("session disconnected: {0}")]
    Disconnected(String),

    /// An operation was attempted before `initialize`.
    #[error("session not initialized")]
    NotInitialized,
}

/// Errors raised when emitting to the UI.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
}

/// Errors that end a connection's workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("chat list did not stabilize within {waited_ms}ms")]
    SyncTimeout { waited_ms: u64 },

    #[error("session ended before it became ready: {0}")]
    SessionDisconnected(String),

    #[error("workflow cancelled")]
    Cancelled,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Stable, machine-readable code sent to the UI alongside an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SessionFailed,
    SyncTimeout,
    Disconnected,
    Internal,
}

impl WorkflowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WorkflowError::Session(SessionError::Disconnected(_))
            | WorkflowError::SessionDisconnected(_) => ErrorCode::Disconnected,
            WorkflowError::Session(SessionError::Decode(_)) => ErrorCode::Internal,
            WorkflowError::Session(_) => ErrorCode::SessionFailed,
            WorkflowError::SyncTimeout { .. } => ErrorCode::SyncTimeout,
            WorkflowError::Cancelled | WorkflowError::Channel(_) => ErrorCode::Internal,
        }
    }

    /// Whether this failure should be reported to the UI. Cancellation and a
    /// closed channel both mean nobody is listening any more.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, WorkflowError::Cancelled | WorkflowError::Channel(_))
    }
}
