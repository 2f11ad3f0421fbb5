//! Error types for the switchboard transport core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of error kinds that survive the transport boundary.
///
/// The boundary is a serialization boundary: whatever richer error a handler
/// fails with must be mapped onto one of these kinds before it crosses a
/// channel. The kind serializes as the wire `code` field, so
/// [`ErrorKind::Internal`] appears as `"INTERNAL_ERROR"` in an `ERROR`
/// envelope's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unclassified handler failure. The default for errors that carry no
    /// explicit kind.
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,

    /// The requested entity does not exist.
    #[serde(rename = "NOT_FOUND")]
    NotFound,

    /// The request payload failed validation.
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,

    /// The caller is not allowed to perform the operation.
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,

    /// The operation conflicts with existing state.
    #[serde(rename = "CONFLICT")]
    Conflict,

    /// A collaborator the handler depends on is unavailable.
    #[serde(rename = "UNAVAILABLE")]
    Unavailable,
}

impl Default for ErrorKind {
    fn default() -> Self {
        Self::Internal
    }
}

/// Failure reported by a channel handler.
///
/// This is the only error shape that crosses a channel: `{message, code}`.
/// The original message is preserved; everything else about the handler's
/// internal error is reduced to the [`ErrorKind`] tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable failure description.
    pub message: String,

    /// Boundary error kind, serialized as the wire `code`.
    #[serde(rename = "code", default)]
    pub kind: ErrorKind,
}

impl HandlerError {
    /// Create a handler error with an explicit kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Unclassified failure (`INTERNAL_ERROR`).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Missing entity (`NOT_FOUND`).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Rejected payload (`VALIDATION_ERROR`).
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Forbidden operation (`UNAUTHORIZED`).
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// State conflict (`CONFLICT`).
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Unavailable collaborator (`UNAVAILABLE`).
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }
}

/// Errors surfaced by transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation attempted before `connect()`.
    #[error("transport is not connected")]
    NotConnected,

    /// The transport disconnected while the operation was outstanding.
    #[error("transport disconnected")]
    Disconnected,

    /// No response arrived within the configured window.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Another router already claimed the channel.
    #[error("channel already claimed by another router: {0}")]
    ChannelClaimed(String),

    /// The responding handler failed; carries the boundary error shape.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Errors surfaced by the typed layers (client helpers, event adapter).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying transport operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload could not be serialized or deserialized.
    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
