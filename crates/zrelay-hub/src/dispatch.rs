// Broadcast dispatcher: decode once, number once, fan out to every room member.
use crate::decode::Decoded;
use crate::hub::Hub;
use crate::message::{OutboundMessage, UpstreamEvent, render_body};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

/// What happened to one upstream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The topic has no configured room.
    NoRoom,
    /// The room was empty; no sequence number was consumed.
    NoSubscribers,
    /// The event was numbered `seq` and offered to every member of the room.
    Delivered {
        seq: u64,
        delivered: usize,
        dropped: usize,
    },
}

impl Hub {
    /// Fans `event` out to the sessions currently subscribed to its topic.
    ///
    /// Never blocks: a full mailbox drops the message for that session only, and a
    /// closed mailbox is pruned from the room.
    pub fn dispatch(&self, event: &UpstreamEvent) -> DispatchOutcome {
        let Some(room) = self.inner.rooms.get(event.topic.as_str()) else {
            tracing::warn!(topic = %event.topic, "event for unconfigured topic discarded");
            metrics::counter!("zrelay_dispatch_unrouted_total").increment(1);
            return DispatchOutcome::NoRoom;
        };

        let members = room.snapshot();
        if members.is_empty() {
            metrics::counter!("zrelay_dispatch_skipped_total").increment(1);
            return DispatchOutcome::NoSubscribers;
        }

        let decoded = self.inner.decoder.decode(&event.topic, &event.payload);
        if let Decoded::Failed(reason) = &decoded {
            tracing::warn!(
                topic = %event.topic,
                counter = event.counter,
                error = %reason,
                "payload decode failed; relaying raw hex"
            );
            metrics::counter!("zrelay_decode_failures_total").increment(1);
        }
        let body = render_body(decoded, &event.payload);

        let seq = room.advance();
        let message = Arc::new(OutboundMessage::for_broadcast(seq, &event.topic, body));

        let mut delivered = 0usize;
        let mut dropped = 0usize;
        let mut closed = Vec::new();
        for member in members.iter() {
            match member.mailbox.try_send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::warn!(
                        session_id = %member.session_id,
                        topic = %event.topic,
                        seq,
                        "session mailbox full; message dropped"
                    );
                    metrics::counter!("zrelay_mailbox_dropped_total").increment(1);
                }
                Err(TrySendError::Closed(_)) => closed.push(member.clone()),
            }
        }
        if !closed.is_empty() {
            room.prune_closed(&closed);
        }

        metrics::counter!("zrelay_dispatch_total").increment(1);
        metrics::counter!("zrelay_delivered_total").increment(delivered as u64);
        tracing::trace!(
            topic = %event.topic,
            counter = event.counter,
            seq,
            delivered,
            dropped,
            pruned = closed.len(),
            "event dispatched"
        );
        DispatchOutcome::Delivered {
            seq,
            delivered,
            dropped,
        }
    }
}
