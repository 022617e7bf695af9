// Inbound upstream events and the outbound event-stream messages built from them.
use crate::decode::Decoded;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::Value;

/// One message received from the upstream publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEvent {
    pub topic: String,
    pub payload: Bytes,
    // Publisher-side sequence hint; diagnostics only.
    pub counter: u32,
}

impl UpstreamEvent {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, counter: u32) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            counter,
        }
    }
}

/// A single event-stream message, shared read-only by every mailbox it is queued into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    id: String,
    event: String,
    data: Vec<String>,
}

impl OutboundMessage {
    pub fn new(id: impl Into<String>, event: impl Into<String>, data: Vec<String>) -> Self {
        Self {
            id: id.into(),
            event: event.into(),
            data,
        }
    }

    pub(crate) fn for_broadcast(seq: u64, topic: &str, body: String) -> Self {
        Self {
            id: seq.to_string(),
            event: topic.to_string(),
            data: vec![body],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn data(&self) -> &[String] {
        &self.data
    }

    /// Renders the `text/event-stream` frame for this message.
    ///
    /// ```
    /// use zrelay_hub::OutboundMessage;
    ///
    /// let msg = OutboundMessage::new("7", "rawtx", vec![r#"{"raw":"00"}"#.to_string()]);
    /// assert_eq!(msg.to_event_stream(), "id: 7\nevent: rawtx\ndata: {\"raw\":\"00\"}\n\n");
    /// ```
    pub fn to_event_stream(&self) -> String {
        let mut frame = String::new();
        if !self.id.is_empty() {
            frame.push_str("id: ");
            frame.push_str(&self.id);
            frame.push('\n');
        }
        if !self.event.is_empty() {
            frame.push_str("event: ");
            frame.push_str(&self.event);
            frame.push('\n');
        }
        if self.data.is_empty() {
            frame.push_str("data: \n");
        }
        for line in self.data.iter().flat_map(|data| data.split('\n')) {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }
}

/// Builds the one-line JSON body for a decoded (or undecodable) payload.
///
/// Structured documents carry the original payload as base64 under `raw`;
/// everything else falls back to `{"raw": "<hex>"}`.
pub(crate) fn render_body(decoded: Decoded, payload: &[u8]) -> String {
    if let Decoded::Document(mut document) = decoded {
        document.insert("raw".to_string(), Value::String(STANDARD.encode(payload)));
        if let Ok(body) = serde_json::to_string(&Value::Object(document)) {
            return body;
        }
    }
    raw_hex_body(payload)
}

pub(crate) fn raw_hex_body(payload: &[u8]) -> String {
    serde_json::json!({ "raw": hex::encode(payload) }).to_string()
}
