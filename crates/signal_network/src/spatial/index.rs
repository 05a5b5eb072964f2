//! # Spatial Index
//!
//! Owns the set of live sensor nodes. Nodes live in a flat table keyed by
//! [`NodeId`]; a position map enforces one node per block and a map of
//! region buckets serves range queries. Connection sets are adjacency lists
//! of ids stored on the nodes themselves.
//!
//! Every structure sits behind a single `RwLock`, so a registration and the
//! connectivity update it triggers are observed by readers as one step, and
//! reads hand out cloned snapshots rather than live views.

use super::grid;
use crate::error::NetworkError;
use crate::graph;
use crate::types::{NetworkStats, NodeId, NodeOwner, NodePosition, RegionId, SensorNode};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Lock-protected contents of the index.
#[derive(Debug, Default)]
pub(crate) struct IndexState {
    pub(crate) nodes: HashMap<NodeId, SensorNode>,
    pub(crate) by_position: HashMap<NodePosition, NodeId>,
    pub(crate) by_region: HashMap<RegionId, BTreeSet<NodeId>>,
    next_id: u64,
}

impl IndexState {
    /// Inserts a node into the table, the position map and its region
    /// bucket. Returns `None` when the position is occupied.
    fn insert(&mut self, position: NodePosition, owner: NodeOwner) -> Option<NodeId> {
        if self.by_position.contains_key(&position) {
            return None;
        }
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.by_region
            .entry(position.region())
            .or_default()
            .insert(id);
        self.by_position.insert(position.clone(), id);
        self.nodes.insert(id, SensorNode::new(id, position, owner));
        Some(id)
    }

    /// Removes the node at `position` along with every edge touching it.
    fn remove(&mut self, position: &NodePosition) -> Option<SensorNode> {
        let id = self.by_position.remove(position)?;
        graph::unlink_all(self, id);
        let node = self.nodes.remove(&id)?;

        let region = position.region();
        if let Some(bucket) = self.by_region.get_mut(&region) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.by_region.remove(&region);
            }
        }
        Some(node)
    }

    /// Ids of nodes within `max_distance` of `center` in the same world.
    ///
    /// Coarse phase selects candidate region buckets, fine phase filters by
    /// exact distance. When the square of cells to probe is larger than the
    /// number of occupied buckets, the occupied buckets are walked instead.
    pub(crate) fn ids_in_range(&self, center: &NodePosition, max_distance: f64) -> Vec<NodeId> {
        if max_distance.is_nan() || max_distance < 0.0 {
            return Vec::new();
        }

        let buckets: Vec<&BTreeSet<NodeId>> = match grid::cell_radius(max_distance) {
            Some(radius) if grid::cell_span(radius) <= self.by_region.len() as u64 => {
                grid::cells_in_range(center, max_distance)
                    .iter()
                    .filter_map(|cell| self.by_region.get(cell))
                    .collect()
            }
            _ => self
                .by_region
                .iter()
                .filter(|(cell, _)| grid::cell_may_contain(center, cell, max_distance))
                .map(|(_, bucket)| bucket)
                .collect(),
        };

        buckets
            .into_iter()
            .flatten()
            .filter(|id| {
                self.nodes
                    .get(*id)
                    .is_some_and(|node| node.position.within(center, max_distance))
            })
            .copied()
            .collect()
    }

    pub(crate) fn position_of(&self, id: NodeId) -> Option<&NodePosition> {
        self.nodes.get(&id).map(|node| &node.position)
    }

    fn snapshots<'a>(&self, ids: impl IntoIterator<Item = &'a NodeId>) -> Vec<SensorNode> {
        let mut nodes: Vec<SensorNode> = ids
            .into_iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect();
        nodes.sort_by(|a, b| a.position.cmp(&b.position));
        nodes
    }

    pub(crate) fn stats(&self) -> NetworkStats {
        let endpoints: usize = self.nodes.values().map(|node| node.connections.len()).sum();
        NetworkStats {
            sensor_count: self.nodes.len(),
            connection_count: endpoints / 2,
            region_count: self.by_region.len(),
        }
    }
}

/// Concurrency-safe registry of sensor nodes, sharded by region.
#[derive(Debug)]
pub struct SpatialIndex {
    state: RwLock<IndexState>,
    interaction_radius: f64,
}

impl SpatialIndex {
    /// Creates an empty index whose nodes connect within `interaction_radius`.
    pub fn new(interaction_radius: f64) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            interaction_radius,
        }
    }

    pub fn interaction_radius(&self) -> f64 {
        self.interaction_radius
    }

    /// Registers a node and connects it to every node within interaction
    /// radius. Fails with [`NetworkError::DuplicateNode`] if the position is
    /// already occupied.
    pub fn register(
        &self,
        position: NodePosition,
        owner: NodeOwner,
    ) -> Result<SensorNode, NetworkError> {
        let mut state = self.state.write();
        let id = state
            .insert(position.clone(), owner)
            .ok_or_else(|| NetworkError::DuplicateNode(position.clone()))?;
        graph::link(&mut state, id, self.interaction_radius);

        let node = state
            .nodes
            .get(&id)
            .cloned()
            .ok_or(NetworkError::NotFound(position))?;
        debug!(
            position = %node.position,
            id = %node.id,
            connections = node.connections.len(),
            "Registered sensor"
        );
        Ok(node)
    }

    /// Removes the node at `position` and every connection to it.
    /// Fails with [`NetworkError::NotFound`] when nothing is registered there.
    pub fn unregister(&self, position: &NodePosition) -> Result<SensorNode, NetworkError> {
        let node = self
            .state
            .write()
            .remove(position)
            .ok_or_else(|| NetworkError::NotFound(position.clone()))?;
        debug!(position = %node.position, id = %node.id, "Unregistered sensor");
        Ok(node)
    }

    pub fn is_registered(&self, position: &NodePosition) -> bool {
        self.state.read().by_position.contains_key(position)
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.state.read().nodes.contains_key(&id)
    }

    pub fn get(&self, position: &NodePosition) -> Option<SensorNode> {
        let state = self.state.read();
        let id = state.by_position.get(position)?;
        state.nodes.get(id).cloned()
    }

    pub fn get_by_id(&self, id: NodeId) -> Option<SensorNode> {
        self.state.read().nodes.get(&id).cloned()
    }

    /// Every registered node, ordered by position.
    pub fn list(&self) -> Vec<SensorNode> {
        let state = self.state.read();
        state.snapshots(state.nodes.keys())
    }

    /// Nodes in the same world as `center` no further than `max_distance`
    /// from it, ordered by position.
    pub fn sensors_in_range(&self, center: &NodePosition, max_distance: f64) -> Vec<SensorNode> {
        let state = self.state.read();
        let ids = state.ids_in_range(center, max_distance);
        state.snapshots(ids.iter())
    }

    /// Nodes whose position falls in `region`, ordered by position.
    pub fn sensors_in_region(&self, region: &RegionId) -> Vec<SensorNode> {
        let state = self.state.read();
        match state.by_region.get(region) {
            Some(bucket) => state.snapshots(bucket.iter()),
            None => Vec::new(),
        }
    }

    /// Sets the active flag of a live node. Returns the updated snapshot, or
    /// `None` if the node has been unregistered in the meantime.
    pub fn set_active(&self, id: NodeId, active: bool) -> Option<SensorNode> {
        let mut state = self.state.write();
        let node = state.nodes.get_mut(&id)?;
        node.active = active;
        Some(node.clone())
    }

    pub fn stats(&self) -> NetworkStats {
        self.state.read().stats()
    }

    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn read_state<R>(&self, f: impl FnOnce(&IndexState) -> R) -> R {
        let state = self.state.read();
        f(&state)
    }

    pub(crate) fn write_state<R>(&self, f: impl FnOnce(&mut IndexState) -> R) -> R {
        let mut state = self.state.write();
        f(&mut state)
    }
}
