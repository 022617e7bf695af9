//! Event-stream endpoint.
//!
//! Opening a stream registers a session with the hub and spawns a task that
//! drains the session mailbox into the response body through a single-slot
//! channel. When the client goes away the body is dropped, the channel closes,
//! and the drain task exits, which unregisters the session from every room.
use crate::api::error::ApiError;
use crate::api::parse_session_id;
use crate::api::types::OpenStreamQuery;
use crate::app::AppState;
use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use zrelay_hub::{DeliverySink, OutboundMessage, SessionId, SinkClosed, TopicSet};

type EventResult = Result<Event, Infallible>;

/// Opens a stream under a server-generated session ID.
pub(crate) async fn open_stream(
    State(state): State<AppState>,
    Query(query): Query<OpenStreamQuery>,
) -> Result<Response, ApiError> {
    start_stream(state, None, query)
}

/// Opens a stream under a client-chosen session ID.
pub(crate) async fn open_stream_with_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OpenStreamQuery>,
) -> Result<Response, ApiError> {
    let session_id = parse_session_id(&id)?;
    start_stream(state, Some(session_id), query)
}

fn start_stream(
    state: AppState,
    requested_id: Option<SessionId>,
    query: OpenStreamQuery,
) -> Result<Response, ApiError> {
    let requested = query
        .dbg_topics
        .as_deref()
        .map(TopicSet::parse_delimited)
        .unwrap_or_default();
    // Validate first so a bad request never evicts a live session with the same ID.
    state.hub.topics().validate(&requested)?;

    let session = state.hub.open(requested_id);
    let session_id = session.id();
    if !requested.is_empty() {
        state.hub.subscribe(&session_id, &requested)?;
    }
    tracing::info!(session = %session_id, topics = ?requested, "event stream opened");
    metrics::counter!("zrelay_http_streams_opened_total").increment(1);

    let (tx, rx) = mpsc::channel::<EventResult>(1);
    tokio::spawn(async move {
        let mut sink = StreamSink { tx };
        let exit = session.drain_until_closed(&mut sink).await;
        tracing::info!(session = %session_id, exit = ?exit, "event stream closed");
    });

    Ok(Sse::new(receiver_stream(rx))
        .keep_alive(KeepAlive::new().interval(state.keep_alive))
        .into_response())
}

fn receiver_stream(rx: mpsc::Receiver<EventResult>) -> impl Stream<Item = EventResult> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

struct StreamSink {
    tx: mpsc::Sender<EventResult>,
}

#[async_trait]
impl DeliverySink for StreamSink {
    async fn deliver(&mut self, message: Arc<OutboundMessage>) -> Result<(), SinkClosed> {
        self.tx
            .send(Ok(to_event(&message)))
            .await
            .map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Renders a message as one event-stream frame; multiple data lines stay separate `data:` fields.
pub(crate) fn to_event(message: &OutboundMessage) -> Event {
    let mut event = Event::default();
    if !message.id().is_empty() && !has_line_break(message.id()) {
        event = event.id(message.id());
    }
    if !message.event().is_empty() && !has_line_break(message.event()) {
        event = event.event(message.event());
    }
    event.data(message.data().join("\n"))
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_reports_closed_once_the_body_is_gone() {
        let (tx, rx) = mpsc::channel::<EventResult>(1);
        let mut sink = StreamSink { tx };
        let message = Arc::new(OutboundMessage::new("1", "rawtx", vec!["{}".to_string()]));
        assert!(sink.deliver(message.clone()).await.is_ok());
        drop(rx);
        sink.closed().await;
        assert_eq!(sink.deliver(message).await, Err(SinkClosed));
    }
}
