use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::watcher::Watcher;

/// Timer-driven fallback for groups where service messages or member
/// lists are unavailable. Only spawned when polling is configured; the
/// event-driven path works without it.
pub async fn run(watcher: Arc<Mutex<Watcher>>, period: Duration) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!("Polling every {}s", period.as_secs());

    loop {
        ticks.tick().await;
        watcher.lock().await.poll_cycle().await;
    }
}
