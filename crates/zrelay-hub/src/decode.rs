// Seam for turning raw topic payloads into structured JSON documents.
use serde_json::{Map, Value};

/// Result of asking a decoder about one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Structured representation of the payload.
    Document(Map<String, Value>),
    /// The decoder has no structured form for this topic.
    Unsupported,
    /// The topic is known but the payload could not be parsed.
    Failed(String),
}

/// Converts raw payload bytes for a topic into a structured document.
///
/// Implementations must be cheap to share: the hub calls `decode` inline on the
/// dispatch path, once per broadcast that has at least one subscriber.
pub trait PayloadDecoder: Send + Sync {
    fn decode(&self, topic: &str, payload: &[u8]) -> Decoded;
}

/// Decoder that never produces a document; every payload is relayed as hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl PayloadDecoder for RawDecoder {
    fn decode(&self, _topic: &str, _payload: &[u8]) -> Decoded {
        Decoded::Unsupported
    }
}

impl<F> PayloadDecoder for F
where
    F: Fn(&str, &[u8]) -> Decoded + Send + Sync,
{
    fn decode(&self, topic: &str, payload: &[u8]) -> Decoded {
        self(topic, payload)
    }
}
