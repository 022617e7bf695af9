// Connection seam between the link state machine and the message bus.
use crate::{LinkError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc;
use std::time::Duration;
use zeromq::{Socket, SocketEvent, SocketRecv, SubSocket};

/// Upper bound on one dial plus handshake; the link's own retry delay applies after it.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens subscriber sockets to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Socket: UpstreamSocket;

    async fn connect(&self, endpoint: &str) -> Result<Self::Socket>;
}

/// A connected subscriber socket.
#[async_trait]
pub trait UpstreamSocket: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Waits for the next multipart message.
    async fn recv(&mut self) -> Result<Vec<Bytes>>;
}

/// ZeroMQ SUB socket connector.
///
/// The socket library redials refused connections on its own schedule and silently drops
/// vanished peers. Both are surfaced as errors here so the link's fixed-delay policy stays
/// in charge of every retry.
#[derive(Debug, Clone, Copy)]
pub struct ZmqConnector {
    connect_timeout: Duration,
}

impl Default for ZmqConnector {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ZmqConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

pub struct ZmqSocket {
    inner: SubSocket,
    // Peer lifecycle events; a disconnect ends the receive loop.
    monitor: mpsc::Receiver<SocketEvent>,
}

fn connect_error(endpoint: &str, reason: impl ToString) -> LinkError {
    LinkError::Connect {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Connector for ZmqConnector {
    type Socket = ZmqSocket;

    async fn connect(&self, endpoint: &str) -> Result<ZmqSocket> {
        // One plain dial first: a refused TCP connection fails fast instead of entering the
        // library's internal redial loop.
        if let Some(addr) = endpoint.strip_prefix("tcp://") {
            let dial = tokio::time::timeout(
                self.connect_timeout,
                tokio::net::TcpStream::connect(addr),
            )
            .await
            .map_err(|_| connect_error(endpoint, "dial timed out"))?
            .map_err(|err| connect_error(endpoint, err))?;
            drop(dial);
        }

        let mut inner = SubSocket::new();
        let monitor = inner.monitor();
        tokio::time::timeout(self.connect_timeout, inner.connect(endpoint))
            .await
            .map_err(|_| connect_error(endpoint, "handshake timed out"))?
            .map_err(|err| connect_error(endpoint, err))?;
        Ok(ZmqSocket { inner, monitor })
    }
}

#[async_trait]
impl UpstreamSocket for ZmqSocket {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.inner
            .subscribe(topic)
            .await
            .map_err(|err| LinkError::Subscribe {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    async fn recv(&mut self) -> Result<Vec<Bytes>> {
        loop {
            tokio::select! {
                biased;
                message = self.inner.recv() => {
                    let message = message.map_err(|err| LinkError::Receive(err.to_string()))?;
                    return Ok(message.into_vec());
                }
                event = self.monitor.next() => match event {
                    Some(SocketEvent::Disconnected(_)) => {
                        return Err(LinkError::Receive("publisher disconnected".to_string()));
                    }
                    Some(_) => continue,
                    None => return Err(LinkError::Receive("socket monitor closed".to_string())),
                },
            }
        }
    }
}
