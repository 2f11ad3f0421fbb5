//! # Switchboard
//!
//! In-process message transport and service routing for the coaching backend.
//!
//! Backend modules (auth, exercises, plans, workouts, media, reporting) never
//! call each other's code directly; they talk over this bus. Two styles of
//! traffic share one channel registry:
//!
//! - **broadcast**: fire-and-forget delivery to every subscriber of a
//!   channel, used for domain events;
//! - **request/response**: a correlation-based RPC convenience built on the
//!   broadcast primitives via ephemeral reply channels.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  call()   ┌──────────────────────────────┐
//! │ ServiceClient├──────────▶│ Transport                    │
//! └──────────────┘           │  send / request / subscribe  │
//! ┌──────────────┐ publish() │  (MemoryTransport in-process)│
//! │ EventBus     ├──────────▶│                              │
//! └──────────────┘           └──────────────┬───────────────┘
//!                                           │ dispatch
//!                                    ┌──────▼───────┐
//!                                    │ Router       │
//!                                    │ channel →    │
//!                                    │   handler    │
//!                                    └──────────────┘
//! ```
//!
//! A requester stamps an ephemeral reply channel into the envelope metadata;
//! the router invokes the matching handler and publishes a `RESPONSE` or
//! `ERROR` envelope back on it. Channels are plain dotted-lowercase strings
//! (`"workout.create"`, `"plan.getPlannedDates"`) by convention.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use switchboard::prelude::*;
//!
//! let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
//! transport.connect().await?;
//!
//! let mut router = Router::new(transport.clone());
//! router.register("echo", |payload| async move { Ok(payload) });
//! router.listen().await?;
//!
//! let client = ServiceClient::new(transport.clone());
//! let reply: String = client.call("echo", &"hi").await?;
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod envelope;
pub mod error;
pub mod events;
pub mod prelude;
pub mod router;
pub mod transport;

pub use client::ServiceClient;
pub use envelope::{Envelope, Metadata};
pub use error::{ClientError, ErrorKind, HandlerError, TransportError};
pub use events::EventBus;
pub use router::Router;
pub use transport::{
    subscriber, MemoryTransport, SendOptions, SubscriberFn, SubscriptionId, Transport,
    TransportConfig,
};
