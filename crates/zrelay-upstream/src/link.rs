// Reconnect state machine for the upstream subscription.
//
// Disconnected -> Connecting -> Subscribed -> Backoff -> Connecting -> ...
// Any connect, subscribe or receive failure moves to Backoff; the only way out of the
// cycle is the cancellation token.
use crate::connector::{Connector, UpstreamSocket};
use crate::sink::EventSink;
use crate::wire::decode_frames;
use crate::{LinkError, Result};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use zrelay_hub::TopicSet;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Subscribed,
    Backoff,
}

/// Fixed-delay retry with no attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay before the given retry attempt (1-based). Constant by construction.
    pub fn delay_for(&self, _attempt: u64) -> Duration {
        self.delay
    }
}

pub struct UpstreamLink<C> {
    connector: C,
    endpoint: String,
    topics: TopicSet,
    policy: ReconnectPolicy,
    state: watch::Sender<LinkState>,
}

impl<C: Connector> UpstreamLink<C> {
    pub fn new(connector: C, endpoint: impl Into<String>, topics: TopicSet) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            connector,
            endpoint: endpoint.into(),
            topics,
            policy: ReconnectPolicy::default(),
            state,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn status(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    /// Runs the link until `cancel` fires, handing every decoded event to `sink`.
    pub async fn run<S>(&self, sink: &S, cancel: CancellationToken)
    where
        S: EventSink + ?Sized,
    {
        let mut attempt: u64 = 0;
        loop {
            self.transition(LinkState::Connecting);
            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                connected = self.connect_and_subscribe() => connected,
            };
            match connected {
                Ok(mut socket) => {
                    attempt = 0;
                    self.transition(LinkState::Subscribed);
                    tracing::info!(
                        endpoint = %self.endpoint,
                        topics = %self.topics.joined(),
                        "upstream link subscribed"
                    );
                    let err = tokio::select! {
                        _ = cancel.cancelled() => break,
                        err = pump(&mut socket, sink) => err,
                    };
                    tracing::warn!(endpoint = %self.endpoint, error = %err, "upstream link lost");
                }
                Err(err) => {
                    tracing::warn!(endpoint = %self.endpoint, error = %err, "upstream connect failed");
                }
            }

            attempt += 1;
            let delay = self.policy.delay_for(attempt);
            self.transition(LinkState::Backoff);
            metrics::counter!("zrelay_upstream_reconnects_total").increment(1);
            tracing::info!(
                endpoint = %self.endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying upstream connection"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.transition(LinkState::Disconnected);
        tracing::info!(endpoint = %self.endpoint, "upstream link stopped");
    }

    async fn connect_and_subscribe(&self) -> Result<C::Socket> {
        let mut socket = self.connector.connect(&self.endpoint).await?;
        for topic in self.topics.iter() {
            socket.subscribe(topic).await?;
        }
        Ok(socket)
    }

    fn transition(&self, next: LinkState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!(from = ?*current, to = ?next, "upstream link state");
            *current = next;
            true
        });
    }
}

// Reads until the socket fails; malformed messages are skipped.
async fn pump<T, S>(socket: &mut T, sink: &S) -> LinkError
where
    T: UpstreamSocket,
    S: EventSink + ?Sized,
{
    loop {
        let frames = match socket.recv().await {
            Ok(frames) => frames,
            Err(err) => return err,
        };
        match decode_frames(frames) {
            Ok(event) => sink.accept(event),
            Err(err) => {
                tracing::warn!(error = %err, "malformed upstream message skipped");
                metrics::counter!("zrelay_upstream_malformed_frames_total").increment(1);
            }
        }
    }
}
