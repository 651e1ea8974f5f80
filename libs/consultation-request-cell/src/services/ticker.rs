// libs/consultation-request-cell/src/services/ticker.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::services::center::NotificationCenter;

/// Runs `tick()` on a fixed cadence, independent of channel health.
pub fn spawn_expiry_ticker(center: Arc<NotificationCenter>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let expired = center.tick().await;
            if !expired.is_empty() {
                debug!("Expiry tick evicted {} offers", expired.len());
            }
        }
    })
}
