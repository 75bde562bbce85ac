//! Wire protocol for the realtime channel.
//!
//! Inbound frames are JSON objects with a `type` discriminator; everything
//! else is opaque payload forwarded verbatim to subscribers. Outbound
//! messages are free-form, but the well-known ones are in [`ClientMessage`].

use serde::{Deserialize, Serialize};

/// Published when the connection opens. Payload: the subject.
pub const EVENT_CONNECTED: &str = "connected";
/// Published when the connection closes. Payload: the subject.
pub const EVENT_DISCONNECTED: &str = "disconnected";
/// Published when the transport reports an error. Payload: the error detail.
pub const EVENT_ERROR: &str = "error";

/// A single inbound frame from the server.
///
/// Only the `type` field is interpreted; all other fields ride along
/// untouched in `payload` so unknown server-sent event types keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Envelope {
    /// Look up a payload field by name.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.payload.get(field)
    }
}

/// Outbound messages with a well-known `type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask the server to deliver a conversation's message stream.
    JoinConversation { conversation_id: String },
    /// Liveness probe; the server answers with a `pong` envelope.
    Ping,
}
