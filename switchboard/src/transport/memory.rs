//! In-process implementation of the transport contract.
//!
//! One `MemoryTransport` is created per process and shared by every module.
//! Channels live in a string-keyed registry of subscriber lists; the
//! request/response protocol rides on the same registry via ephemeral
//! response channels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ MemoryTransport (Arc<Shared>)        │
//! │                                      │
//! │  connected: AtomicBool               │
//! │  channels:  Mutex<channel → [subs]>  │
//! │  pending:   Mutex<reply-chan → req>  │
//! │  claims:    Mutex<Set<channel>>      │
//! └──────────────────────────────────────┘
//! ```
//!
//! Locks guard data only; no lock is held across handler execution. `send`
//! snapshots the subscriber list under the registry lock, then delivers on a
//! spawned task, so publish and handler execution are never observed as
//! synchronous by the caller. A `request()`'s response subscription is
//! inserted before the request envelope reaches `send`, so the reply listener
//! is active before any handler can observe the request.

use super::correlation::{reply_channel_name, PendingReply, ReplyOutcome};
use super::{SendOptions, SubscriberFn, SubscriptionId, Transport, TransportConfig};
use crate::envelope::Envelope;
use crate::error::{HandlerError, TransportError};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

/// One entry in a channel's subscriber list.
#[derive(Clone)]
struct Registration {
    slot: u64,
    handler: SubscriberFn,
}

struct Shared {
    config: TransportConfig,
    connected: AtomicBool,
    next_slot: AtomicU64,
    channels: Mutex<HashMap<String, Vec<Registration>>>,
    pending: Mutex<HashMap<String, PendingReply>>,
    claims: Mutex<HashSet<String>>,
}

impl Shared {
    /// Settle the pending request listening on `reply_channel`.
    ///
    /// The pending record is removed before completion, so a late or
    /// duplicate reply finds nothing and is observed by no caller.
    async fn settle_reply(shared: &Arc<Self>, reply_channel: &str, reply: Envelope) {
        let entry = shared.pending.lock().await.remove(reply_channel);
        let Some(pending) = entry else {
            tracing::debug!(
                channel = %reply_channel,
                "dropping reply for an already-settled request"
            );
            return;
        };
        shared.channels.lock().await.remove(reply_channel);
        pending.complete(reply_outcome(reply));
    }
}

/// Tag the reply: `ERROR` envelopes fail the caller, everything else
/// resolves with the payload.
fn reply_outcome(reply: Envelope) -> ReplyOutcome {
    if reply.is_error() {
        let error = serde_json::from_value::<HandlerError>(reply.payload)
            .unwrap_or_else(|_| HandlerError::internal("malformed error reply"));
        Err(TransportError::Handler(error))
    } else {
        Ok(reply.payload)
    }
}

/// Process-wide in-memory message bus.
///
/// Cheap to clone; all clones share the same registry, pending table, and
/// connection state.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create a transport with the default configuration (5000 ms timeout).
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a transport with a custom configuration.
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connected: AtomicBool::new(false),
                next_slot: AtomicU64::new(1),
                channels: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                claims: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Number of requests currently awaiting a reply.
    pub async fn pending_count(&self) -> usize {
        self.shared.pending.lock().await.len()
    }

    /// Number of handlers currently registered on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.shared
            .channels
            .lock()
            .await
            .get(channel)
            .map_or(0, Vec::len)
    }

    /// Number of channels with at least one registration (ephemeral reply
    /// channels included while their request is in flight).
    pub async fn channel_count(&self) -> usize {
        self.shared.channels.lock().await.len()
    }

    /// Insert a handler without the connection gate. Used for the ephemeral
    /// reply subscription, which is opened inside `request` after the gate
    /// has already been checked.
    async fn insert_subscriber(&self, channel: &str, handler: SubscriberFn) -> SubscriptionId {
        let slot = self.shared.next_slot.fetch_add(1, Ordering::Relaxed);
        let mut channels = self.shared.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_default()
            .push(Registration { slot, handler });
        SubscriptionId::new(channel.to_string(), slot)
    }

    /// Drop a request's pending record and ephemeral subscription.
    async fn abandon_request(&self, reply_channel: &str) {
        self.shared.pending.lock().await.remove(reply_channel);
        self.shared.channels.lock().await.remove(reply_channel);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.shared.connected.store(true, Ordering::SeqCst);
        tracing::debug!("transport connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.shared.connected.store(false, Ordering::SeqCst);

        let drained: Vec<(String, PendingReply)> =
            self.shared.pending.lock().await.drain().collect();
        let rejected = drained.len();
        for (reply_channel, pending) in drained {
            tracing::debug!(
                channel = %reply_channel,
                "rejecting pending request on disconnect"
            );
            pending.reject_disconnected();
        }

        self.shared.channels.lock().await.clear();
        self.shared.claims.lock().await.clear();

        tracing::debug!(rejected_requests = rejected, "transport disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn send(
        &self,
        channel: &str,
        mut envelope: Envelope,
        options: SendOptions,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        if let Some(fields) = options.metadata {
            envelope.merge_metadata(fields);
        }

        // Snapshot under the lock: the live subscribers at send time receive
        // this envelope, in registration order.
        let snapshot: Vec<Registration> = {
            let channels = self.shared.channels.lock().await;
            channels.get(channel).cloned().unwrap_or_default()
        };

        let channel = channel.to_string();
        tokio::spawn(async move {
            for registration in snapshot {
                if let Err(error) = (registration.handler)(envelope.clone()).await {
                    tracing::warn!(
                        channel = %channel,
                        %error,
                        "subscriber failed while handling envelope"
                    );
                }
            }
        });

        Ok(())
    }

    async fn request(
        &self,
        channel: &str,
        envelope: Envelope,
        options: SendOptions,
    ) -> Result<Value, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let correlation_id = Uuid::new_v4().to_string();
        let reply_channel = reply_channel_name(channel, &correlation_id);
        let timeout = options.timeout.unwrap_or(self.shared.config.default_timeout);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .await
            .insert(reply_channel.clone(), PendingReply::new(reply_tx));

        // One-shot responder: the first envelope on the reply channel settles
        // the pending record and tears the subscription down.
        let shared = Arc::clone(&self.shared);
        let settle_channel = reply_channel.clone();
        let responder: SubscriberFn = Arc::new(move |reply: Envelope| {
            let shared = Arc::clone(&shared);
            let settle_channel = settle_channel.clone();
            Box::pin(async move {
                Shared::settle_reply(&shared, &settle_channel, reply).await;
                Ok(())
            })
        });
        self.insert_subscriber(&reply_channel, responder).await;

        let stamped = envelope.with_reply_route(correlation_id.as_str(), reply_channel.as_str());
        if let Err(error) = self.send(channel, stamped, options).await {
            self.abandon_request(&reply_channel).await;
            return Err(error);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without completing: the pending table was
            // cleared out from under us.
            Ok(Err(_)) => Err(TransportError::Disconnected),
            Err(_) => {
                self.abandon_request(&reply_channel).await;
                Err(TransportError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    async fn subscribe(
        &self,
        channel: &str,
        handler: SubscriberFn,
    ) -> Result<SubscriptionId, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        Ok(self.insert_subscriber(channel, handler).await)
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.shared.channels.lock().await.remove(channel);
        Ok(())
    }

    async fn cancel(&self, subscription: SubscriptionId) -> Result<(), TransportError> {
        let mut channels = self.shared.channels.lock().await;
        if let Some(registrations) = channels.get_mut(subscription.channel()) {
            registrations.retain(|r| r.slot != subscription.slot());
        }
        Ok(())
    }

    async fn claim(&self, channel: &str) -> Result<(), TransportError> {
        let mut claims = self.shared.claims.lock().await;
        if !claims.insert(channel.to_string()) {
            return Err(TransportError::ChannelClaimed(channel.to_string()));
        }
        Ok(())
    }

    async fn release(&self, channel: &str) -> Result<(), TransportError> {
        self.shared.claims.lock().await.remove(channel);
        Ok(())
    }
}
