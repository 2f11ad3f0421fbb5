//! Transport contract and its in-process implementation.
//!
//! The contract is an object-safe async trait so modules depend on
//! `Arc<dyn Transport>` handed out by the application container, never on the
//! concrete backend. [`MemoryTransport`] is the in-process implementation.

mod correlation;
mod memory;

pub use memory::MemoryTransport;

use crate::envelope::Envelope;
use crate::error::{HandlerError, TransportError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Future returned by a subscriber callback.
pub type SubscriberFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// Type-erased subscriber callback invoked once per delivered envelope.
///
/// A failing callback is logged by the delivery loop and does not disturb
/// sibling subscribers on the channel.
pub type SubscriberFn = Arc<dyn Fn(Envelope) -> SubscriberFuture + Send + Sync>;

/// Wrap an async closure into a [`SubscriberFn`].
pub fn subscriber<F, Fut>(callback: F) -> SubscriberFn
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |envelope| Box::pin(callback(envelope)))
}

/// Options accepted by `send` and `request`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Response window for `request`. Ignored by plain `send`. Defaults to
    /// the transport's configured timeout (5000 ms out of the box).
    pub timeout: Option<Duration>,

    /// Reserved for future delivery policies; not enforced.
    pub retries: Option<u32>,

    /// Extra fields merged into the envelope's metadata bag before dispatch.
    pub metadata: Option<Map<String, Value>>,
}

impl SendOptions {
    /// Options with an explicit request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// Transport-level configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Response window applied when a request carries no explicit timeout.
    pub default_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(5000),
        }
    }
}

impl TransportConfig {
    /// Configuration with a custom default request timeout.
    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

/// Opaque handle naming one registration in a channel's subscriber list.
///
/// Returned by [`Transport::subscribe`]; only the holder can cancel that
/// specific registration via [`Transport::cancel`]. The coarse
/// [`Transport::unsubscribe`] remains the channel-wide removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    channel: String,
    slot: u64,
}

impl SubscriptionId {
    pub(crate) fn new(channel: String, slot: u64) -> Self {
        Self { channel, slot }
    }

    /// The channel this registration belongs to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub(crate) fn slot(&self) -> u64 {
        self.slot
    }
}

/// Process-wide, connection-gated message bus.
///
/// One instance is created per process and shared as `Arc<dyn Transport>`.
/// `connect()` must be invoked once before any `send`/`request`/`subscribe`;
/// `disconnect()` releases every pending request and subscription
/// deterministically at shutdown.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Mark the transport ready for traffic.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Tear the transport down: rejects every outstanding request with a
    /// disconnect error and clears all subscriptions and claims.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Cheap state probe.
    fn is_connected(&self) -> bool;

    /// Fire-and-forget broadcast to every current subscriber of `channel`.
    ///
    /// Delivery is deferred to a spawned task; the caller never observes
    /// handler execution synchronously. Subscriber failures are caught
    /// per-handler and logged.
    async fn send(
        &self,
        channel: &str,
        envelope: Envelope,
        options: SendOptions,
    ) -> Result<(), TransportError>;

    /// Correlation-based call/response over the pub/sub primitives.
    ///
    /// Resolves with the reply's payload, or fails with the responder's
    /// boundary error when the reply is an `ERROR` envelope, a timeout after
    /// the configured window, or a connection/disconnect error.
    async fn request(
        &self,
        channel: &str,
        envelope: Envelope,
        options: SendOptions,
    ) -> Result<Value, TransportError>;

    /// Append `handler` to the channel's subscriber list.
    ///
    /// Returns once registered; past messages are not replayed.
    async fn subscribe(
        &self,
        channel: &str,
        handler: SubscriberFn,
    ) -> Result<SubscriptionId, TransportError>;

    /// Remove *all* handlers registered for `channel`.
    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Remove exactly the registration named by `subscription`.
    async fn cancel(&self, subscription: SubscriptionId) -> Result<(), TransportError>;

    /// Take exclusive service-side ownership of `channel`.
    ///
    /// Fails fast with [`TransportError::ChannelClaimed`] if another router
    /// already owns it. Claims do not affect plain subscriptions.
    async fn claim(&self, channel: &str) -> Result<(), TransportError>;

    /// Give up a claim taken with [`Transport::claim`]. A no-op if absent.
    async fn release(&self, channel: &str) -> Result<(), TransportError>;
}
