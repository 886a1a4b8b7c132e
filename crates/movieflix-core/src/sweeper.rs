//! Periodic expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::MovieCache;

/// Default sweep period: hourly.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Spawn a task that calls [`MovieCache::sweep_expired`] every `interval`
/// until `cancel` fires. The first sweep happens one full interval after
/// spawning.
pub fn spawn_sweeper(
    cache: Arc<MovieCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval() completes its first tick immediately
        ticker.tick().await;

        tracing::info!(interval_secs = interval.as_secs(), "cache sweeper started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("cache sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    cache.sweep_expired(Utc::now());
                }
            }
        }
    })
}
