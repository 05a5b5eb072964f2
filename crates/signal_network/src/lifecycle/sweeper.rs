//! Background task running the periodic hot-region sweep.

use super::HotRegionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Spawns a task that calls [`HotRegionManager::sweep`] every `period`
/// until `shutdown` flips to `true` or its sender is dropped.
///
/// The first sweep runs one full period after spawning.
pub fn spawn_sweeper(
    manager: Arc<HotRegionManager>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?period, "Hot region sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let released = manager.sweep();
                    debug!(released = released.len(), hot = manager.hot_count(), "Sweep tick");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Hot region sweeper stopped");
    })
}
