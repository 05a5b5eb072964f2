//! Stand-in world for running the relay outside a game server.
//!
//! Region activation and node state changes are logged instead of applied.
//! Only worlds named in the configuration can have regions activated.

use parking_lot::Mutex;
use signal_network::{NodeStateApplier, RegionActivator, RegionId, SensorNode, WorldError};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct LoggingWorld {
    /// Empty accepts every world
    worlds: HashSet<String>,
    loaded: Mutex<HashSet<RegionId>>,
}

impl LoggingWorld {
    pub fn new(worlds: impl IntoIterator<Item = String>) -> Self {
        Self {
            worlds: worlds.into_iter().collect(),
            loaded: Mutex::new(HashSet::new()),
        }
    }

    pub fn knows_world(&self, world: &str) -> bool {
        self.worlds.is_empty() || self.worlds.contains(world)
    }

    /// Regions currently held loaded.
    pub fn loaded_regions(&self) -> usize {
        self.loaded.lock().len()
    }
}

impl RegionActivator for LoggingWorld {
    fn activate_region(&self, region: &RegionId) -> Result<(), WorldError> {
        if !self.knows_world(&region.world) {
            return Err(WorldError::WorldNotFound(region.world.clone()));
        }
        if self.loaded.lock().insert(region.clone()) {
            debug!(%region, "Region force-loaded");
        }
        Ok(())
    }

    fn deactivate_region(&self, region: &RegionId) {
        if self.loaded.lock().remove(region) {
            debug!(%region, "Region unloaded");
        }
    }
}

impl NodeStateApplier for LoggingWorld {
    fn apply_node_state(&self, node: &SensorNode, active: bool, strength: u8) {
        info!(
            position = %node.position,
            active,
            strength,
            "Sensor state changed"
        );
    }
}
