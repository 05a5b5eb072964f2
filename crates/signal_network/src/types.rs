//! # Core Type Definitions
//!
//! Fundamental types shared by every component of the sensor network: node
//! identifiers and positions, the coarse region grid, node snapshots and
//! network statistics.
//!
//! ## Key Types
//!
//! - [`NodeId`] - Stable arena identifier for a registered node
//! - [`NodePosition`] - Block position inside a named world
//! - [`RegionId`] - Grid cell used for indexing and for hot-region lifecycle
//! - [`SensorNode`] - Point-in-time snapshot of a registered node

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Number of bits a block coordinate is shifted by to obtain its region.
pub const REGION_SHIFT: u32 = 4;

/// Edge length of one region cell in world units.
pub const REGION_SIZE: i32 = 1 << REGION_SHIFT;

/// Stable identifier of a registered node.
///
/// Ids are handed out by the spatial index on registration and are never
/// reused, so an id held by a pending callback can always be checked for
/// liveness even after another node took over the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque identifier of whoever registered a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeOwner(pub Uuid);

impl NodeOwner {
    /// Creates a new random owner id using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for NodeOwner {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for NodeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block position of a node inside a named world.
///
/// Two nodes at the same position are the same node. The derived ordering
/// (world, then x, y, z) is what path tie-breaking and snapshot listings
/// sort by.
///
/// # Examples
///
/// ```rust
/// use signal_network::NodePosition;
///
/// let a = NodePosition::new("overworld", 0, 64, 0);
/// let b = NodePosition::new("overworld", 3, 64, 4);
/// assert_eq!(a.distance(&b), Some(5.0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodePosition {
    /// Name of the world the block lives in
    pub world: String,
    /// X block coordinate (east-west)
    pub x: i32,
    /// Y block coordinate (vertical)
    pub y: i32,
    /// Z block coordinate (north-south)
    pub z: i32,
}

impl NodePosition {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Euclidean distance to `other`, or `None` when the worlds differ.
    pub fn distance(&self, other: &NodePosition) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    /// True when `other` is in the same world and no further than `max_distance`.
    pub fn within(&self, other: &NodePosition, max_distance: f64) -> bool {
        self.distance(other)
            .is_some_and(|distance| distance <= max_distance)
    }

    /// The region cell containing this position.
    pub fn region(&self) -> RegionId {
        RegionId::containing(self)
    }
}

impl fmt::Display for NodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// Coarse spatial bucket: a world plus a grid cell on the horizontal plane.
///
/// Used as the sharding key of the spatial index and as the unit kept
/// active by the hot-region manager.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId {
    /// Name of the world the region belongs to
    pub world: String,
    /// Grid x (block x shifted right by [`REGION_SHIFT`])
    pub x: i32,
    /// Grid z (block z shifted right by [`REGION_SHIFT`])
    pub z: i32,
}

impl RegionId {
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// The region containing `position`. Arithmetic shift floors negative
    /// coordinates, so block -1 lands in region -1.
    pub fn containing(position: &NodePosition) -> Self {
        Self {
            world: position.world.clone(),
            x: position.x >> REGION_SHIFT,
            z: position.z >> REGION_SHIFT,
        }
    }

    /// The region offset by `dx`/`dz` cells in the same world.
    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// The 3x3 block of regions centred on this one (including itself).
    pub fn neighbors(&self) -> Vec<RegionId> {
        let mut neighbors = Vec::with_capacity(9);
        for dx in -1..=1 {
            for dz in -1..=1 {
                neighbors.push(self.offset(dx, dz));
            }
        }
        neighbors
    }

    /// Distance between cell coordinates; infinite across worlds.
    pub fn distance(&self, other: &RegionId) -> f64 {
        if self.world != other.world {
            return f64::INFINITY;
        }
        let dx = f64::from(self.x - other.x);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dz * dz).sqrt()
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}, {}]", self.world, self.x, self.z)
    }
}

/// Snapshot of a registered sensor node.
///
/// Returned by value from every read on the spatial index; later mutations
/// of the registry are not reflected in a snapshot already handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorNode {
    pub id: NodeId,
    pub position: NodePosition,
    pub owner: NodeOwner,
    /// Whether the node is currently relaying a signal
    pub active: bool,
    /// Ids of nodes within interaction radius. Always symmetric.
    pub connections: BTreeSet<NodeId>,
}

impl SensorNode {
    pub(crate) fn new(id: NodeId, position: NodePosition, owner: NodeOwner) -> Self {
        Self {
            id,
            position,
            owner,
            active: false,
            connections: BTreeSet::new(),
        }
    }

    pub fn region(&self) -> RegionId {
        self.position.region()
    }

    pub fn is_connected_to(&self, other: NodeId) -> bool {
        self.connections.contains(&other)
    }

    pub fn distance_to(&self, other: &SensorNode) -> Option<f64> {
        self.position.distance(&other.position)
    }
}

/// Persistent form of a node: just enough to re-register it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub position: NodePosition,
    pub owner: NodeOwner,
}

impl From<&SensorNode> for StoredNode {
    fn from(node: &SensorNode) -> Self {
        Self {
            position: node.position.clone(),
            owner: node.owner,
        }
    }
}

/// Aggregate counters over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Number of registered sensors
    pub sensor_count: usize,
    /// Number of undirected connections
    pub connection_count: usize,
    /// Number of regions containing at least one sensor
    pub region_count: usize,
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sensors={}, connections={}, regions={}",
            self.sensor_count, self.connection_count, self.region_count
        )
    }
}
