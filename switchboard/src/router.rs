//! Channel → handler dispatch for service modules.
//!
//! A `Router` turns "channel → handler function" registrations into transport
//! subscriptions and turns handler outcomes into `RESPONSE`/`ERROR` envelopes
//! on the requester's reply channel. Modules register handlers during setup,
//! call [`Router::listen`] once, and never touch `Transport::subscribe`
//! directly.

use crate::envelope::Envelope;
use crate::error::{HandlerError, TransportError};
use crate::transport::{SendOptions, SubscriberFn, Transport};

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a route handler.
pub type RouteFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// Type-erased route handler: unwrapped request payload in, result payload or
/// boundary error out.
pub type RouteFn = Arc<dyn Fn(Value) -> RouteFuture + Send + Sync>;

/// Per-module dispatch table over a shared transport.
///
/// Channel registration is exclusive across routers: `listen()` claims each
/// channel on the transport and fails fast if another router already owns it,
/// so a duplicate registration surfaces at startup instead of as two services
/// racing to answer the same request.
pub struct Router {
    transport: Arc<dyn Transport>,
    routes: HashMap<String, RouteFn>,
    /// Channels claimed and subscribed by `listen()`, torn down by `close()`.
    active: Vec<String>,
}

impl Router {
    /// Create a router over the shared transport handle.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            routes: HashMap::new(),
            active: Vec::new(),
        }
    }

    /// Register `handler` for `channel`.
    ///
    /// Purely local; does not touch the transport. Re-registering a channel
    /// on the same router replaces the previous handler (last write wins).
    /// Registration happens during setup, never while `listen()` is handling
    /// traffic.
    pub fn register<F, Fut>(&mut self, channel: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        let route: RouteFn = Arc::new(move |payload| Box::pin(handler(payload)));
        self.routes.insert(channel.into(), route);
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Claim and subscribe every registered channel.
    ///
    /// Fails fast on the first channel another router already claimed; claims
    /// taken earlier in the same call are released before the error is
    /// returned. Calling `listen()` again after it succeeded is a no-op.
    pub async fn listen(&mut self) -> Result<(), TransportError> {
        if !self.active.is_empty() {
            return Ok(());
        }

        let routes: Vec<(String, RouteFn)> = self
            .routes
            .iter()
            .map(|(channel, route)| (channel.clone(), Arc::clone(route)))
            .collect();

        for (channel, _) in &routes {
            if let Err(error) = self.transport.claim(channel).await {
                for claimed in &self.active {
                    self.transport.release(claimed).await.ok();
                }
                self.active.clear();
                return Err(error);
            }
            self.active.push(channel.clone());
        }

        for (channel, route) in routes {
            let dispatch = make_dispatch(Arc::clone(&self.transport), channel.clone(), route);
            if let Err(error) = self.transport.subscribe(&channel, dispatch).await {
                self.teardown().await;
                return Err(error);
            }
        }

        tracing::debug!(routes = self.active.len(), "router listening");
        Ok(())
    }

    /// Unsubscribe and release every channel, then clear the route table.
    /// Idempotent.
    pub async fn close(&mut self) {
        self.teardown().await;
        self.routes.clear();
    }

    async fn teardown(&mut self) {
        for channel in self.active.drain(..) {
            self.transport.unsubscribe(&channel).await.ok();
            self.transport.release(&channel).await.ok();
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Build the subscriber that dispatches one channel's traffic to its handler.
///
/// A handler failure never propagates past dispatch: with a reply channel
/// present it becomes an `ERROR` envelope, otherwise a logged line.
fn make_dispatch(transport: Arc<dyn Transport>, channel: String, route: RouteFn) -> SubscriberFn {
    Arc::new(move |envelope: Envelope| {
        let transport = Arc::clone(&transport);
        let channel = channel.clone();
        let route = Arc::clone(&route);
        Box::pin(async move {
            let reply_channel = envelope.response_channel().map(str::to_string);
            let outcome = route(envelope.payload).await;

            match (outcome, reply_channel) {
                (Ok(result), Some(reply_channel)) => {
                    let sent = transport
                        .send(&reply_channel, Envelope::response(result), SendOptions::default())
                        .await;
                    if let Err(error) = sent {
                        tracing::warn!(
                            channel = %channel,
                            %error,
                            "failed to publish response envelope"
                        );
                    }
                }
                // Fire-and-forget traffic on a registered channel: the result
                // is discarded.
                (Ok(_), None) => {}
                (Err(handler_error), Some(reply_channel)) => {
                    let sent = transport
                        .send(
                            &reply_channel,
                            Envelope::error(&handler_error),
                            SendOptions::default(),
                        )
                        .await;
                    if let Err(error) = sent {
                        tracing::warn!(
                            channel = %channel,
                            %error,
                            "failed to publish error envelope"
                        );
                    }
                }
                (Err(handler_error), None) => {
                    tracing::error!(
                        channel = %channel,
                        error = %handler_error,
                        "handler failed with no responder waiting"
                    );
                }
            }
            Ok(())
        })
    })
}
