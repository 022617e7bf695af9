// Session identity, the per-session mailbox and its drain loop.
use crate::hub::HubInner;
use crate::message::OutboundMessage;
use crate::{HubError, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifier of one streaming client.
///
/// Any UUID is accepted from callers; server-assigned IDs are time-ordered (v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| HubError::InvalidSessionId(raw.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("delivery sink closed")]
pub struct SinkClosed;

/// Transport a session drains its mailbox into.
#[async_trait]
pub trait DeliverySink: Send {
    /// Writes and flushes one message.
    async fn deliver(&mut self, message: Arc<OutboundMessage>) -> std::result::Result<(), SinkClosed>;

    /// Resolves once the transport can no longer accept messages.
    async fn closed(&self);
}

/// Why a drain loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainExit {
    /// The session was evicted, removed, or the hub shut down.
    Cancelled,
    /// The transport went away (client disconnect).
    TransportClosed,
    /// Every sender for the mailbox was dropped.
    MailboxClosed,
}

/// RAII handle that unregisters a session on drop.
///
/// Removal is keyed on the registration generation so a stale handle never removes a
/// newer session that reused the same ID.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    hub: Weak<HubInner>,
    session_id: SessionId,
    generation: u64,
}

impl SessionGuard {
    pub(crate) fn new(hub: Weak<HubInner>, session_id: SessionId, generation: u64) -> Self {
        Self {
            hub,
            session_id,
            generation,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove_generation(&self.session_id, self.generation);
        }
    }
}

/// One open streaming connection.
///
/// Dropping the session (or finishing [`ClientSession::drain_until_closed`]) closes the
/// mailbox and removes the session from the registry and every room.
#[derive(Debug)]
pub struct ClientSession {
    id: SessionId,
    mailbox: mpsc::Receiver<Arc<OutboundMessage>>,
    cancel: CancellationToken,
    _guard: SessionGuard,
}

enum DrainStep {
    Deliver(Arc<OutboundMessage>),
    Exit(DrainExit),
}

impl ClientSession {
    pub(crate) fn new(
        id: SessionId,
        mailbox: mpsc::Receiver<Arc<OutboundMessage>>,
        cancel: CancellationToken,
        guard: SessionGuard,
    ) -> Self {
        Self {
            id,
            mailbox,
            cancel,
            _guard: guard,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that fires when this session is evicted, removed, or the hub shuts down.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the next queued message; `None` once the session is cancelled or closed.
    pub async fn next_message(&mut self) -> Option<Arc<OutboundMessage>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            message = self.mailbox.recv() => message,
        }
    }

    pub fn try_next(&mut self) -> Option<Arc<OutboundMessage>> {
        self.mailbox.try_recv().ok()
    }

    /// Drains the mailbox into `sink` until the session is cancelled or the sink closes.
    ///
    /// Each message is delivered (and flushed by the sink) before the next wait. On return
    /// the mailbox is closed and the session is unregistered.
    pub async fn drain_until_closed<S>(mut self, sink: &mut S) -> DrainExit
    where
        S: DeliverySink + ?Sized,
    {
        let exit = loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => DrainStep::Exit(DrainExit::Cancelled),
                _ = sink.closed() => DrainStep::Exit(DrainExit::TransportClosed),
                message = self.mailbox.recv() => match message {
                    Some(message) => DrainStep::Deliver(message),
                    None => DrainStep::Exit(DrainExit::MailboxClosed),
                },
            };
            match step {
                DrainStep::Deliver(message) => {
                    if sink.deliver(message).await.is_err() {
                        break DrainExit::TransportClosed;
                    }
                }
                DrainStep::Exit(exit) => break exit,
            }
        };
        tracing::debug!(session_id = %self.id, ?exit, "session drain loop finished");
        self.mailbox.close();
        exit
    }
}
