//! Common imports for switchboard consumers.
//!
//! Backend modules typically want the transport handle types, the router, and
//! the typed helpers in one line.

pub use crate::client::ServiceClient;
pub use crate::envelope::{Envelope, Metadata};
pub use crate::error::{ClientError, ErrorKind, HandlerError, TransportError};
pub use crate::events::EventBus;
pub use crate::router::Router;
pub use crate::transport::{
    subscriber, MemoryTransport, SendOptions, SubscriberFn, SubscriptionId, Transport,
    TransportConfig,
};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use serde_json::Value;
pub use std::sync::Arc;
pub use std::time::Duration;

/// Convenience alias for transport-level results.
pub type Result<T> = std::result::Result<T, TransportError>;
