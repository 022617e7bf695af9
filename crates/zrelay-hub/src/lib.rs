// In-process broadcast hub for upstream topic events.
// One Room per configured topic holds the sessions subscribed to it; the dispatcher
// fans each upstream event out to the bounded mailboxes of the current members.
mod decode;
mod dispatch;
mod hub;
mod message;
mod room;
mod session;
mod topic;

pub use decode::{Decoded, PayloadDecoder, RawDecoder};
pub use dispatch::DispatchOutcome;
pub use hub::{DEFAULT_MAILBOX_CAPACITY, Hub, HubBuilder};
pub use message::{OutboundMessage, UpstreamEvent};
pub use room::Room;
pub use session::{ClientSession, DeliverySink, DrainExit, SessionId, SinkClosed};
pub use topic::TopicSet;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("unknown events: '{}', valid events are '{}'", invalid.join(", "), valid.join(", "))]
    UnknownTopics {
        invalid: Vec<String>,
        valid: Vec<String>,
    },
    #[error("'{0}' is not a current client")]
    UnknownSession(SessionId),
    #[error("'id' must be a valid UUID")]
    InvalidSessionId(String),
    #[error("mailbox capacity must be greater than zero")]
    InvalidCapacity,
}

impl HubError {
    /// True for errors caused by the caller's input rather than hub state.
    pub fn is_validation(&self) -> bool {
        !matches!(self, HubError::InvalidCapacity)
    }
}
