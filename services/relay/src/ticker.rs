//! Debug ticker: a synthetic event source for exercising streams without an
//! upstream publisher.
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use zrelay_hub::{Hub, UpstreamEvent};

pub const TICKER_TOPIC: &str = "debug:ticker";
pub const TICKER_INTERVAL: Duration = Duration::from_secs(5);

/// Dispatches an 8-byte big-endian counter on [`TICKER_TOPIC`] every `period`,
/// starting at 1, until `cancel` fires. Returns the number of ticks sent.
pub async fn run_ticker(hub: Hub, period: Duration, cancel: CancellationToken) -> u64 {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut count: u64 = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        count += 1;
        let event = UpstreamEvent::new(TICKER_TOPIC, count.to_be_bytes().to_vec(), count as u32);
        hub.dispatch(&event);
    }
    tracing::debug!(ticks = count, "debug ticker stopped");
    count
}
