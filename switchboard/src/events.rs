//! Named-event facade over the transport's broadcast primitives.
//!
//! Domain modules announce things that already happened ("workout.created",
//! "plan.archived") without expecting an answer. The adapter maps the event
//! name onto a channel of the same name, the envelope label onto the event
//! name, and never touches the request/response protocol.

use crate::envelope::Envelope;
use crate::error::{ClientError, HandlerError};
use crate::transport::{SendOptions, SubscriptionId, Transport};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Fire-and-forget domain event bus.
#[derive(Clone)]
pub struct EventBus {
    transport: Arc<dyn Transport>,
}

impl EventBus {
    /// Create an event bus over the shared transport handle.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Broadcast `payload` to every subscriber of `event`.
    pub async fn publish<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), ClientError> {
        let envelope = Envelope::new(event, serde_json::to_value(payload)?);
        self.transport
            .send(event, envelope, SendOptions::default())
            .await?;
        Ok(())
    }

    /// Register `callback` for every future `event`, decoding the payload.
    ///
    /// A payload that fails to decode is reported as a handler failure and
    /// logged by the delivery loop; sibling subscribers are unaffected.
    pub async fn subscribe<T, F, Fut>(
        &self,
        event: &str,
        callback: F,
    ) -> Result<SubscriptionId, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let event_name = event.to_string();
        let callback = Arc::new(callback);
        let handler = crate::transport::subscriber(move |envelope: Envelope| {
            let event_name = event_name.clone();
            let callback = Arc::clone(&callback);
            async move {
                let payload: T = serde_json::from_value(envelope.payload).map_err(|error| {
                    HandlerError::internal(format!(
                        "failed to decode {event_name} event payload: {error}"
                    ))
                })?;
                callback(payload).await;
                Ok(())
            }
        });

        Ok(self.transport.subscribe(event, handler).await?)
    }

    /// Remove every callback registered for `event`.
    ///
    /// Coarse by contract: this also removes callbacks registered by
    /// unrelated consumers of the same event name. Use the
    /// [`SubscriptionId`] from [`EventBus::subscribe`] with
    /// `Transport::cancel` to remove just one.
    pub async fn unsubscribe(&self, event: &str) -> Result<(), ClientError> {
        self.transport.unsubscribe(event).await?;
        Ok(())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
