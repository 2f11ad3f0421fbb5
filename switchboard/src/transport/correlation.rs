//! Pending-request bookkeeping for the request/response protocol.
//!
//! Each `request()` call opens one [`PendingReply`], keyed in the transport's
//! pending table by the ephemeral response channel name. The record is removed
//! from the table before completion, so a late or duplicate reply finds no
//! record and is observed by no caller.

use crate::error::TransportError;
use serde_json::Value;
use std::time::Instant;
use tokio::sync::oneshot;

/// Outcome delivered to a waiting `request()` caller.
pub(crate) type ReplyOutcome = Result<Value, TransportError>;

/// Ephemeral channel name for a request's single reply.
///
/// Derived deterministically from the target channel and the correlation id;
/// the `:response:` infix keeps it out of the dotted-lowercase namespace used
/// by caller-chosen channels.
pub(crate) fn reply_channel_name(channel: &str, correlation_id: &str) -> String {
    format!("{channel}:response:{correlation_id}")
}

/// State for a single pending request awaiting its reply.
#[derive(Debug)]
pub(crate) struct PendingReply {
    /// Consumed on completion; `None` afterwards.
    sender: Option<oneshot::Sender<ReplyOutcome>>,

    /// When the request was opened. Kept for diagnostics.
    opened_at: Instant,
}

impl PendingReply {
    pub(crate) fn new(sender: oneshot::Sender<ReplyOutcome>) -> Self {
        Self {
            sender: Some(sender),
            opened_at: Instant::now(),
        }
    }

    /// Deliver the outcome to the waiting caller.
    ///
    /// The receiver may already be gone (the caller timed out and dropped its
    /// await); that is not an error worth more than a debug line.
    pub(crate) fn complete(mut self, outcome: ReplyOutcome) {
        if let Some(sender) = self.sender.take() {
            if sender.send(outcome).is_err() {
                tracing::debug!(
                    elapsed_ms = self.opened_at.elapsed().as_millis() as u64,
                    "reply receiver dropped before completion"
                );
            }
        }
    }

    /// Reject the caller because the transport disconnected.
    pub(crate) fn reject_disconnected(self) {
        self.complete(Err(TransportError::Disconnected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_channel_name_format() {
        assert_eq!(
            reply_channel_name("workout.create", "abc-123"),
            "workout.create:response:abc-123"
        );
    }

    #[tokio::test]
    async fn test_complete_delivers_outcome() {
        let (tx, rx) = oneshot::channel();
        let pending = PendingReply::new(tx);

        pending.complete(Ok(json!("hi")));

        assert_eq!(rx.await.unwrap().unwrap(), json!("hi"));
    }

    #[tokio::test]
    async fn test_reject_disconnected() {
        let (tx, rx) = oneshot::channel();
        let pending = PendingReply::new(tx);

        pending.reject_disconnected();

        assert!(matches!(
            rx.await.unwrap(),
            Err(TransportError::Disconnected)
        ));
    }

    #[test]
    fn test_complete_with_dropped_receiver_does_not_panic() {
        let (tx, rx) = oneshot::channel();
        drop(rx);

        PendingReply::new(tx).complete(Ok(json!(null)));
    }
}
