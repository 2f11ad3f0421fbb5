//! Typed request helpers over `Transport::request`.
//!
//! A [`ServiceClient`] is the per-route convenience used by producer modules:
//! it wraps a typed request object in an envelope (label = channel name
//! upper-cased, metadata pre-filled) and delegates to the transport's
//! request/response protocol, deserializing the typed reply.

use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::transport::{SendOptions, Transport};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Thin typed wrapper around `Transport::request`.
///
/// Carries no state beyond the transport handle and per-client defaults, and
/// makes no concurrency decisions of its own.
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    sender: Option<String>,
    timeout: Option<Duration>,
}

impl ServiceClient {
    /// Create a client over the shared transport handle.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sender: None,
            timeout: None,
        }
    }

    /// Tag outgoing envelopes with the calling module's name.
    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Override the transport's default request timeout for this client.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Issue a typed request on `channel` and await the typed reply.
    ///
    /// The envelope label is the channel name upper-cased, and the metadata
    /// carries a pre-filled timestamp and an advisory correlation id. The
    /// transport's protocol stamps its own authoritative correlation id on
    /// top before dispatch.
    pub async fn call<Req, Resp>(&self, channel: &str, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request)?;
        let mut envelope = Envelope::new(channel.to_uppercase(), payload);
        if let Some(metadata) = envelope.metadata.as_mut() {
            metadata.correlation_id = Some(Uuid::new_v4().to_string());
            metadata.sender = self.sender.clone();
        }

        let options = SendOptions {
            timeout: self.timeout,
            ..SendOptions::default()
        };
        let reply = self.transport.request(channel, envelope, options).await?;
        Ok(serde_json::from_value(reply)?)
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("sender", &self.sender)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
