//! Messages travelling over the bus.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::topology::TRACE_ID_HEADER;

/// A message published to an exchange.
///
/// Fields are private: once a message is built and published, its headers
/// (the `traceId` in particular) cannot be changed by anything downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    id: String,
    routing_key: String,
    payload: Vec<u8>,
    headers: BTreeMap<String, String>,
}

impl Message {
    /// Create a message with a fresh id and no headers.
    pub fn new(routing_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            routing_key: routing_key.into(),
            payload,
            headers: BTreeMap::new(),
        }
    }

    /// Create a message with a UTF-8 text payload.
    pub fn with_string_payload(routing_key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(routing_key, payload.into().into_bytes())
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// The `traceId` header, if one was attached.
    pub fn trace_id(&self) -> Option<&str> {
        self.header(TRACE_ID_HEADER)
    }

    /// Same message under another routing key; used when the bus dead-letters it.
    pub(crate) fn rerouted(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }
}

/// A message handed to a consumer by the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned tag used to ack or nack this delivery.
    pub tag: u64,
    /// Queue the message was taken from.
    pub queue: String,
    /// Set when the message was requeued at least once before this delivery.
    pub redelivered: bool,
    pub message: Message,
}

impl Delivery {
    pub fn payload_str(&self) -> Option<&str> {
        self.message.payload_str()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.message.trace_id()
    }
}
