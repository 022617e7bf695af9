// Upstream link: keeps a SUB connection to the publisher alive and feeds the hub.
// Frames are decoded on the link task and handed to the sink inline, so the
// publisher's ordering is preserved all the way into the rooms.
mod connector;
mod link;
mod sink;
mod wire;

pub use connector::{CONNECT_TIMEOUT, Connector, UpstreamSocket, ZmqConnector, ZmqSocket};
pub use link::{DEFAULT_RECONNECT_DELAY, LinkState, ReconnectPolicy, UpstreamLink};
pub use sink::EventSink;
pub use wire::{FrameError, decode_frames};

pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("subscribe to topic {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },
    #[error("receive failed: {0}")]
    Receive(String),
}
