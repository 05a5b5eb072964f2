//! # Hot Region Lifecycle
//!
//! Keeps a bounded set of world regions active while signals cross them and
//! guarantees each one is eventually released again.
//!
//! A region moves `absent -> hot -> absent`. It becomes hot on its first
//! [`acquire`](HotRegionManager::acquire), and further acquires only push
//! back its expiry. It leaves through an explicit release, its own deferred
//! expiry check, the periodic [`sweep`](HotRegionManager::sweep), or
//! [`shutdown`](HotRegionManager::shutdown).
//!
//! All bookkeeping and every call into the [`RegionActivator`] happen under
//! one mutex, so the hot set always matches what the world was told.

mod clock;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sweeper::spawn_sweeper;

use crate::config::NetworkSettings;
use crate::error::NetworkError;
use crate::scheduler::{ScheduledTask, TickScheduler};
use crate::types::RegionId;
use crate::world::RegionActivator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bookkeeping for one hot region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotRegionEntry {
    pub region: RegionId,
    /// When the region was activated
    pub loaded_at: Instant,
    /// Last activation or refresh
    pub last_extended: Instant,
}

impl HotRegionEntry {
    fn new(region: RegionId, now: Instant) -> Self {
        Self {
            region,
            loaded_at: now,
            last_extended: now,
        }
    }

    /// Time since the last activation or refresh.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_extended)
    }

    /// Strictly longer idle than `max_lifetime`.
    pub fn is_expired(&self, now: Instant, max_lifetime: Duration) -> bool {
        self.idle(now) > max_lifetime
    }
}

/// What an [`acquire`](HotRegionManager::acquire) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The region was not hot and has been activated
    Activated,
    /// The region was already hot; its expiry was pushed back
    Extended,
}

/// Counters describing the hot-region pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotRegionStats {
    pub hot: usize,
    pub capacity: usize,
    pub activations: u64,
    pub extensions: u64,
    pub rejections: u64,
    pub releases: u64,
}

#[derive(Debug, Default)]
struct PoolState {
    entries: HashMap<RegionId, HotRegionEntry>,
    activations: u64,
    extensions: u64,
    rejections: u64,
    releases: u64,
}

/// Capacity- and TTL-bounded pool of hot regions.
pub struct HotRegionManager {
    state: Mutex<PoolState>,
    activator: Arc<dyn RegionActivator>,
    scheduler: Arc<TickScheduler>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    max_lifetime: Duration,
    release_check_delay: u64,
}

impl std::fmt::Debug for HotRegionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotRegionManager")
            .field("hot", &self.hot_count())
            .field("capacity", &self.capacity)
            .field("max_lifetime", &self.max_lifetime)
            .finish()
    }
}

impl HotRegionManager {
    pub fn new(
        settings: &NetworkSettings,
        activator: Arc<dyn RegionActivator>,
        scheduler: Arc<TickScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            activator,
            scheduler,
            clock,
            capacity: settings.max_hot_regions,
            max_lifetime: settings.max_hot_lifetime(),
            release_check_delay: settings.release_check_delay_ticks,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Makes `region` hot, or refreshes it if it already is.
    ///
    /// A new region is refused with [`NetworkError::CapacityExceeded`] when
    /// the pool is full, and with [`NetworkError::WorldUnavailable`] when the
    /// activator cannot resolve its world; neither is retried. A newly
    /// activated region gets an expiry check queued on the tick scheduler.
    pub fn acquire(&self, region: &RegionId) -> Result<AcquireOutcome, NetworkError> {
        let now = self.clock.now();
        {
            let mut state = self.state.lock();
            if let Some(entry) = state.entries.get_mut(region) {
                entry.last_extended = now;
                state.extensions += 1;
                debug!(%region, "Extended hot region lifetime");
                return Ok(AcquireOutcome::Extended);
            }

            if state.entries.len() >= self.capacity {
                state.rejections += 1;
                warn!(
                    %region,
                    capacity = self.capacity,
                    "Maximum hot regions reached, cannot activate more"
                );
                return Err(NetworkError::CapacityExceeded {
                    region: region.clone(),
                    capacity: self.capacity,
                });
            }

            if let Err(source) = self.activator.activate_region(region) {
                warn!(%region, error = %source, "Region activation failed");
                return Err(NetworkError::WorldUnavailable {
                    region: region.clone(),
                    source,
                });
            }

            state
                .entries
                .insert(region.clone(), HotRegionEntry::new(region.clone(), now));
            state.activations += 1;
        }

        self.scheduler.schedule(
            self.release_check_delay,
            ScheduledTask::ReleaseCheck {
                region: region.clone(),
            },
        );
        debug!(%region, "Activated hot region");
        Ok(AcquireOutcome::Activated)
    }

    /// Releases `region` if it is hot. Returns whether anything was released.
    pub fn release(&self, region: &RegionId) -> bool {
        let mut state = self.state.lock();
        let released = self.release_locked(&mut state, region);
        if released {
            debug!(%region, "Released hot region");
        }
        released
    }

    /// Deferred per-entry check: releases `region` only if it has been idle
    /// longer than the max lifetime, so a refreshed region survives.
    pub fn release_if_expired(&self, region: &RegionId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let expired = state
            .entries
            .get(region)
            .is_some_and(|entry| entry.is_expired(now, self.max_lifetime));
        if !expired {
            return false;
        }
        self.release_locked(&mut state, region);
        debug!(%region, "Released expired hot region");
        true
    }

    /// Releases every region idle longer than the max lifetime. Returns the
    /// released regions in order.
    pub fn sweep(&self) -> Vec<RegionId> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let mut expired: Vec<RegionId> = state
            .entries
            .values()
            .filter(|entry| entry.is_expired(now, self.max_lifetime))
            .map(|entry| entry.region.clone())
            .collect();
        expired.sort();

        for region in &expired {
            self.release_locked(&mut state, region);
            debug!(%region, "Periodic sweep released hot region");
        }
        if !expired.is_empty() {
            info!(
                released = expired.len(),
                remaining = state.entries.len(),
                "Hot region sweep complete"
            );
        }
        expired
    }

    /// Releases every hot region regardless of age and clears all state.
    /// Returns how many regions were released.
    pub fn shutdown(&self) -> usize {
        let mut state = self.state.lock();
        let mut regions: Vec<RegionId> = state.entries.keys().cloned().collect();
        regions.sort();
        for region in &regions {
            self.release_locked(&mut state, region);
        }
        info!(released = regions.len(), "Cleaned up all hot regions");
        regions.len()
    }

    fn release_locked(&self, state: &mut PoolState, region: &RegionId) -> bool {
        if state.entries.remove(region).is_none() {
            return false;
        }
        self.activator.deactivate_region(region);
        state.releases += 1;
        true
    }

    pub fn is_hot(&self, region: &RegionId) -> bool {
        self.state.lock().entries.contains_key(region)
    }

    pub fn hot_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn entry(&self, region: &RegionId) -> Option<HotRegionEntry> {
        self.state.lock().entries.get(region).cloned()
    }

    /// Snapshot of every hot entry, ordered by region.
    pub fn entries(&self) -> Vec<HotRegionEntry> {
        let mut entries: Vec<HotRegionEntry> =
            self.state.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.region.cmp(&b.region));
        entries
    }

    pub fn stats(&self) -> HotRegionStats {
        let state = self.state.lock();
        HotRegionStats {
            hot: state.entries.len(),
            capacity: self.capacity,
            activations: state.activations,
            extensions: state.extensions,
            rejections: state.rejections,
            releases: state.releases,
        }
    }
}
