//! The envelope exchanged on every channel.
//!
//! An envelope is `{type, payload, metadata}`. The transport never inspects
//! `payload`; the only fields it owns are `metadata.correlationId` and
//! `metadata.responseChannel`, which the request/response protocol stamps on
//! outgoing requests.

use crate::error::HandlerError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata bag carried by an envelope.
///
/// `timestamp` is always present once the bag exists; everything else is
/// optional. Unknown keys are preserved in `extra` so callers can piggyback
/// their own fields without the transport caring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Milliseconds since the Unix epoch at which the envelope was stamped.
    pub timestamp: u64,

    /// Token binding a request to its eventual response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Ephemeral channel the responder should reply on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_channel: Option<String>,

    /// Optional name of the sending module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Arbitrary caller-supplied keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    /// Create a metadata bag stamped with the current time.
    pub fn now() -> Self {
        Self {
            timestamp: unix_millis(),
            ..Self::default()
        }
    }
}

/// Unit of exchange on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Caller-supplied label. Not used for routing; purely diagnostic.
    #[serde(rename = "type")]
    pub kind: String,

    /// Structured payload, opaque to the transport.
    pub payload: Value,

    /// Optional metadata bag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Envelope {
    /// Label used by routers for successful replies.
    pub const RESPONSE: &'static str = "RESPONSE";

    /// Label used by routers for failed replies.
    pub const ERROR: &'static str = "ERROR";

    /// Create an envelope stamped with a fresh timestamp.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            metadata: Some(Metadata::now()),
        }
    }

    /// Create a `RESPONSE` envelope carrying a handler's result.
    pub fn response(payload: Value) -> Self {
        Self::new(Self::RESPONSE, payload)
    }

    /// Create an `ERROR` envelope carrying the boundary `{message, code}`
    /// shape.
    pub fn error(error: &HandlerError) -> Self {
        let payload = serde_json::to_value(error)
            .unwrap_or_else(|_| Value::String(error.message.clone()));
        Self::new(Self::ERROR, payload)
    }

    /// Whether this envelope is an `ERROR` reply.
    pub fn is_error(&self) -> bool {
        self.kind == Self::ERROR
    }

    /// The reply channel a responder should publish to, if any.
    pub fn response_channel(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.response_channel.as_deref())
    }

    /// The correlation id stamped on this envelope, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.correlation_id.as_deref())
    }

    /// Stamp the request-routing fields onto this envelope.
    ///
    /// Re-stamps `timestamp` and sets `correlationId` and `responseChannel`,
    /// creating the metadata bag if the caller omitted it. Any caller-supplied
    /// `sender` or extra keys are preserved.
    pub fn with_reply_route(
        mut self,
        correlation_id: impl Into<String>,
        response_channel: impl Into<String>,
    ) -> Self {
        let metadata = self.metadata.get_or_insert_with(Metadata::default);
        metadata.timestamp = unix_millis();
        metadata.correlation_id = Some(correlation_id.into());
        metadata.response_channel = Some(response_channel.into());
        self
    }

    /// Merge caller-supplied option fields into the metadata bag.
    pub fn merge_metadata(&mut self, fields: Map<String, Value>) {
        let metadata = self.metadata.get_or_insert_with(Metadata::now);
        metadata.extra.extend(fields);
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_stamps_timestamp() {
        let envelope = Envelope::new("WORKOUT.CREATE", json!({"reps": 10}));

        let metadata = envelope.metadata.expect("metadata stamped");
        assert!(metadata.timestamp > 0);
        assert!(metadata.correlation_id.is_none());
        assert!(metadata.response_channel.is_none());
    }

    #[test]
    fn test_wire_field_names() {
        let envelope = Envelope::new("X", json!("hi"))
            .with_reply_route("abc-123", "echo:response:abc-123");
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["type"], "X");
        assert_eq!(json["payload"], "hi");
        assert_eq!(json["metadata"]["correlationId"], "abc-123");
        assert_eq!(json["metadata"]["responseChannel"], "echo:response:abc-123");
    }

    #[test]
    fn test_with_reply_route_preserves_caller_metadata() {
        let mut envelope = Envelope::new("X", json!(null));
        if let Some(metadata) = envelope.metadata.as_mut() {
            metadata.sender = Some("workout".to_string());
            metadata.extra.insert("traceId".to_string(), json!("t-1"));
        }

        let stamped = envelope.with_reply_route("c-1", "x:response:c-1");
        let metadata = stamped.metadata.unwrap();

        assert_eq!(metadata.sender.as_deref(), Some("workout"));
        assert_eq!(metadata.extra["traceId"], "t-1");
        assert_eq!(metadata.correlation_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn test_with_reply_route_creates_missing_metadata() {
        let bare = Envelope {
            kind: "X".to_string(),
            payload: json!(1),
            metadata: None,
        };

        let stamped = bare.with_reply_route("c-2", "ghost:response:c-2");
        assert_eq!(stamped.response_channel(), Some("ghost:response:c-2"));
        assert_eq!(stamped.correlation_id(), Some("c-2"));
    }

    #[test]
    fn test_error_envelope_shape() {
        let envelope = Envelope::error(&HandlerError::internal("boom"));

        assert!(envelope.is_error());
        assert_eq!(envelope.payload["message"], "boom");
        assert_eq!(envelope.payload["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn test_response_envelope_kind() {
        let envelope = Envelope::response(json!([1, 2, 3]));
        assert_eq!(envelope.kind, Envelope::RESPONSE);
        assert!(!envelope.is_error());
    }

    #[test]
    fn test_extra_keys_survive_round_trip() {
        let mut envelope = Envelope::new("PLAN.GETPLANNEDDATES", json!({}));
        envelope.merge_metadata(
            json!({"requestSource": "mobile"}).as_object().cloned().unwrap(),
        );

        let text = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();

        let metadata = back.metadata.unwrap();
        assert_eq!(metadata.extra["requestSource"], "mobile");
    }
}
