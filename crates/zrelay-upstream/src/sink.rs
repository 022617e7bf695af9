use zrelay_hub::{DispatchOutcome, Hub, UpstreamEvent};

/// Consumer of decoded upstream events.
///
/// Called inline on the link task; the next frame is not read until `accept` returns.
pub trait EventSink: Send + Sync {
    fn accept(&self, event: UpstreamEvent);
}

impl EventSink for Hub {
    fn accept(&self, event: UpstreamEvent) {
        if let DispatchOutcome::NoRoom = self.dispatch(&event) {
            tracing::debug!(topic = %event.topic, counter = event.counter, "no room for upstream topic");
        }
    }
}
