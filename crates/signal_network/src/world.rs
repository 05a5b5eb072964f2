//! Seams to the host world.
//!
//! The network never touches world state directly. Region activation, node
//! state application and persistence are supplied by the embedding
//! application through these traits.

use crate::error::{NetworkError, WorldError};
use crate::types::{RegionId, SensorNode, StoredNode};
use async_trait::async_trait;

/// Keeps world regions loaded.
///
/// Both calls must return quickly; the hot-region manager invokes them while
/// holding its lock.
pub trait RegionActivator: Send + Sync {
    /// Marks `region` as kept active. Fails if its world cannot be resolved.
    fn activate_region(&self, region: &RegionId) -> Result<(), WorldError>;

    /// Lets `region` unload again. Must be idempotent.
    fn deactivate_region(&self, region: &RegionId);
}

/// Reflects a node's active flag into the world. Fire-and-forget.
pub trait NodeStateApplier: Send + Sync {
    fn apply_node_state(&self, node: &SensorNode, active: bool, strength: u8);
}

/// Durable storage of the registered node set.
///
/// Used once at startup and once at shutdown, never while signals are
/// propagating.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn load_nodes(&self) -> Result<Vec<StoredNode>, NetworkError>;

    async fn save_nodes(&self, nodes: &[StoredNode]) -> Result<(), NetworkError>;
}
