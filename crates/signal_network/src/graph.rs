//! # Connectivity Graph
//!
//! Edges are derived from the spatial index: two nodes in the same world are
//! connected iff their distance is at most the interaction radius. Edges carry
//! no weight of their own; traversal recomputes the Euclidean length from the
//! endpoint positions.
//!
//! Both endpoints of an edge are updated under the index's write lock, so no
//! reader ever observes a one-sided connection.

use crate::error::{invariant_violation, NetworkError};
use crate::spatial::{IndexState, SpatialIndex};
use crate::types::{NetworkStats, NodeId, NodePosition, SensorNode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Connects `id` to every other node within `radius`.
pub(crate) fn link(state: &mut IndexState, id: NodeId, radius: f64) {
    let Some(position) = state.position_of(id).cloned() else {
        return;
    };
    for other in state.ids_in_range(&position, radius) {
        if other == id {
            continue;
        }
        if let Some(node) = state.nodes.get_mut(&id) {
            node.connections.insert(other);
        }
        if let Some(peer) = state.nodes.get_mut(&other) {
            peer.connections.insert(id);
        }
    }
}

/// Drops every edge touching `id`, on both sides.
pub(crate) fn unlink_all(state: &mut IndexState, id: NodeId) {
    let peers = state
        .nodes
        .get_mut(&id)
        .map(|node| std::mem::take(&mut node.connections))
        .unwrap_or_default();
    for peer in peers {
        if let Some(node) = state.nodes.get_mut(&peer) {
            node.connections.remove(&id);
        }
    }
}

/// Directed connections `(from, to)` whose reverse is missing, or whose
/// target is not a live node.
pub(crate) fn asymmetric_edges(state: &IndexState) -> Vec<(NodeId, NodeId)> {
    let mut broken = Vec::new();
    for node in state.nodes.values() {
        for peer in &node.connections {
            let mirrored = state
                .nodes
                .get(peer)
                .is_some_and(|other| other.connections.contains(&node.id));
            if !mirrored {
                broken.push((node.id, *peer));
            }
        }
    }
    broken.sort();
    broken
}

fn relink_everything(state: &mut IndexState, radius: f64) {
    for node in state.nodes.values_mut() {
        node.connections.clear();
    }
    let mut ids: Vec<NodeId> = state.nodes.keys().copied().collect();
    ids.sort();
    for id in ids {
        link(state, id, radius);
    }
}

/// Neighbor lookup and maintenance over a [`SpatialIndex`].
#[derive(Debug, Clone)]
pub struct ConnectivityGraph {
    index: Arc<SpatialIndex>,
}

impl ConnectivityGraph {
    pub fn new(index: Arc<SpatialIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<SpatialIndex> {
        &self.index
    }

    /// Clears the connections of the node at `position` and links it again
    /// against its current surroundings. Returns the refreshed snapshot, or
    /// `None` when no node is registered there.
    pub fn recompute(&self, position: &NodePosition) -> Option<SensorNode> {
        let radius = self.index.interaction_radius();
        self.index.write_state(|state| {
            let id = *state.by_position.get(position)?;
            unlink_all(state, id);
            link(state, id, radius);
            state.nodes.get(&id).cloned()
        })
    }

    /// Rebuilds every edge in the network. Pairwise in cost; meant for
    /// administrative use rather than the propagation path.
    pub fn recompute_all(&self) -> NetworkStats {
        info!("Recalculating all network connections");
        let radius = self.index.interaction_radius();
        let stats = self.index.write_state(|state| {
            relink_everything(state, radius);
            state.stats()
        });
        info!(%stats, "Network recalculation complete");
        stats
    }

    /// Ids connected to `id`, ordered by position. Empty for unknown ids.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.index.read_state(|state| {
            let Some(node) = state.nodes.get(&id) else {
                return Vec::new();
            };
            let mut neighbors: Vec<(&NodePosition, NodeId)> = node
                .connections
                .iter()
                .filter_map(|peer| state.position_of(*peer).map(|p| (p, *peer)))
                .collect();
            neighbors.sort();
            neighbors.into_iter().map(|(_, peer)| peer).collect()
        })
    }

    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.index.read_state(|state| {
            state
                .nodes
                .get(&a)
                .is_some_and(|node| node.connections.contains(&b))
        })
    }

    /// Verifies that every connection is mirrored on its peer.
    ///
    /// A broken edge is a programming error: fatal with debug assertions,
    /// otherwise the graph is rebuilt from positions and the violation is
    /// returned to the caller.
    pub fn verify_symmetry(&self) -> Result<(), NetworkError> {
        let broken = self.index.read_state(asymmetric_edges);
        if broken.is_empty() {
            return Ok(());
        }
        let err = invariant_violation(format!(
            "{} one-sided connection(s), first {:?}",
            broken.len(),
            broken[0]
        ));
        self.heal();
        Err(err)
    }

    /// Rebuilds the whole graph. Used to recover from a detected
    /// inconsistency.
    pub(crate) fn heal(&self) {
        let radius = self.index.interaction_radius();
        let stats = self.index.write_state(|state| {
            relink_everything(state, radius);
            state.stats()
        });
        info!(%stats, "Connectivity graph rebuilt");
    }

    /// Copies the adjacency structure for read-only traversal.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.index.read_state(GraphSnapshot::capture)
    }
}

/// One node of a [`GraphSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotNode {
    pub position: NodePosition,
    /// Connected ids, ordered by their position
    pub neighbors: Vec<NodeId>,
}

/// Immutable copy of the graph taken under a single read lock.
///
/// Path computations run on a snapshot so that concurrent registrations
/// cannot change the graph halfway through a traversal.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: HashMap<NodeId, SnapshotNode>,
}

impl GraphSnapshot {
    pub(crate) fn capture(state: &IndexState) -> Self {
        let nodes = state
            .nodes
            .values()
            .map(|node| {
                let mut neighbors: Vec<(&NodePosition, NodeId)> = node
                    .connections
                    .iter()
                    .filter_map(|peer| state.position_of(*peer).map(|p| (p, *peer)))
                    .collect();
                neighbors.sort();
                (
                    node.id,
                    SnapshotNode {
                        position: node.position.clone(),
                        neighbors: neighbors.into_iter().map(|(_, peer)| peer).collect(),
                    },
                )
            })
            .collect();
        debug!("Captured graph snapshot");
        Self { nodes }
    }

    /// Builds a snapshot directly from positions and edges. Edges are
    /// inserted in both directions.
    pub fn from_edges(
        positions: impl IntoIterator<Item = (NodeId, NodePosition)>,
        edges: impl IntoIterator<Item = (NodeId, NodeId)>,
    ) -> Self {
        let mut nodes: HashMap<NodeId, SnapshotNode> = positions
            .into_iter()
            .map(|(id, position)| {
                (
                    id,
                    SnapshotNode {
                        position,
                        neighbors: Vec::new(),
                    },
                )
            })
            .collect();
        for (a, b) in edges {
            if a == b || !nodes.contains_key(&a) || !nodes.contains_key(&b) {
                continue;
            }
            for (from, to) in [(a, b), (b, a)] {
                if let Some(node) = nodes.get_mut(&from) {
                    if !node.neighbors.contains(&to) {
                        node.neighbors.push(to);
                    }
                }
            }
        }
        let positions: HashMap<NodeId, NodePosition> = nodes
            .iter()
            .map(|(id, node)| (*id, node.position.clone()))
            .collect();
        for node in nodes.values_mut() {
            node.neighbors.sort_by(|a, b| positions[a].cmp(&positions[b]));
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&SnapshotNode> {
        self.nodes.get(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<&NodePosition> {
        self.nodes.get(&id).map(|node| &node.position)
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.neighbors.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// Euclidean length of the edge `a`-`b`, or `None` if there is no such edge.
    pub fn edge_length(&self, a: NodeId, b: NodeId) -> Option<f64> {
        if !self.is_edge(a, b) {
            return None;
        }
        self.position(a)?.distance(self.position(b)?)
    }

    /// Every id in the snapshot, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeOwner;

    fn pos(x: i32, y: i32, z: i32) -> NodePosition {
        NodePosition::new("w", x, y, z)
    }

    fn graph_with(radius: f64, positions: &[NodePosition]) -> (ConnectivityGraph, Vec<NodeId>) {
        let index = Arc::new(SpatialIndex::new(radius));
        let ids = positions
            .iter()
            .map(|p| index.register(p.clone(), NodeOwner::new()).unwrap().id)
            .collect();
        (ConnectivityGraph::new(index), ids)
    }

    fn assert_symmetric(graph: &ConnectivityGraph) {
        assert!(graph.index().read_state(asymmetric_edges).is_empty());
    }

    #[test]
    fn test_nearby_nodes_connect_and_far_nodes_do_not() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(10, 0, 0), pos(1000, 0, 0)]);

        assert!(graph.are_connected(ids[0], ids[1]));
        assert!(graph.are_connected(ids[1], ids[0]));
        assert!(graph.neighbors(ids[2]).is_empty());
        assert_symmetric(&graph);
    }

    #[test]
    fn test_edge_at_exact_radius() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(0, 16, 0), pos(0, 32, 0)]);
        assert!(graph.are_connected(ids[0], ids[1]));
        assert!(graph.are_connected(ids[1], ids[2]));
        assert!(!graph.are_connected(ids[0], ids[2]));
    }

    #[test]
    fn test_no_edges_across_worlds() {
        let (graph, ids) = graph_with(
            16.0,
            &[pos(0, 0, 0), NodePosition::new("nether", 0, 0, 0)],
        );
        assert!(!graph.are_connected(ids[0], ids[1]));
    }

    #[test]
    fn test_neighbors_are_ordered_by_position() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(5, 0, 0), pos(-5, 0, 0), pos(0, 0, 3)]);
        let neighbors = graph.neighbors(ids[0]);
        assert_eq!(neighbors, vec![ids[2], ids[3], ids[1]]);
    }

    #[test]
    fn test_recompute_keeps_symmetry() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(8, 0, 0), pos(16, 0, 0)]);

        let refreshed = graph.recompute(&pos(8, 0, 0)).unwrap();
        assert_eq!(refreshed.connections.len(), 2);
        assert!(graph.are_connected(ids[0], ids[1]));
        assert_symmetric(&graph);

        assert!(graph.recompute(&pos(99, 0, 0)).is_none());
    }

    #[test]
    fn test_recompute_all_restores_edges() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(8, 0, 0), pos(16, 0, 0), pos(500, 0, 0)]);
        graph.index().write_state(|state| {
            for node in state.nodes.values_mut() {
                node.connections.clear();
            }
        });
        assert!(!graph.are_connected(ids[0], ids[1]));

        let stats = graph.recompute_all();
        assert_eq!(stats.sensor_count, 4);
        assert_eq!(stats.connection_count, 3);
        assert!(graph.are_connected(ids[0], ids[2]));
        assert_symmetric(&graph);
    }

    #[test]
    fn test_symmetry_holds_after_mixed_mutations() {
        let index = Arc::new(SpatialIndex::new(16.0));
        let graph = ConnectivityGraph::new(Arc::clone(&index));
        for i in 0..30 {
            index.register(pos(i * 5, 0, (i % 3) * 7), NodeOwner::new()).unwrap();
            assert_symmetric(&graph);
        }
        for i in (0..30).step_by(4) {
            index.unregister(&pos(i * 5, 0, (i % 3) * 7)).unwrap();
            assert_symmetric(&graph);
        }
        graph.recompute(&pos(5, 0, 7));
        assert_symmetric(&graph);
        graph.recompute_all();
        assert_symmetric(&graph);
        assert!(graph.verify_symmetry().is_ok());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "one-sided connection")]
    fn test_asymmetry_is_fatal_in_debug_builds() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(8, 0, 0)]);
        graph.index().write_state(|state| {
            state.nodes.get_mut(&ids[0]).unwrap().connections.remove(&ids[1]);
        });
        let _ = graph.verify_symmetry();
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_asymmetry_self_heals_in_release_builds() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(8, 0, 0)]);
        graph.index().write_state(|state| {
            state.nodes.get_mut(&ids[0]).unwrap().connections.remove(&ids[1]);
        });

        let result = graph.verify_symmetry();
        assert!(matches!(result, Err(NetworkError::InvariantViolation(_))));
        assert!(graph.are_connected(ids[0], ids[1]));
        assert!(graph.verify_symmetry().is_ok());
    }

    #[test]
    fn test_snapshot_is_detached_from_index() {
        let (graph, ids) = graph_with(16.0, &[pos(0, 0, 0), pos(8, 0, 0)]);
        let snapshot = graph.snapshot();

        graph.index().unregister(&pos(8, 0, 0)).unwrap();
        assert!(snapshot.is_edge(ids[0], ids[1]));
        assert_eq!(snapshot.edge_length(ids[0], ids[1]), Some(8.0));
        assert!(!graph.snapshot().contains(ids[1]));
    }

    #[test]
    fn test_from_edges_is_bidirectional() {
        let snapshot = GraphSnapshot::from_edges(
            [(NodeId(1), pos(0, 0, 0)), (NodeId(2), pos(3, 0, 0)), (NodeId(3), pos(9, 0, 0))],
            [(NodeId(1), NodeId(2)), (NodeId(2), NodeId(3)), (NodeId(2), NodeId(9))],
        );
        assert!(snapshot.is_edge(NodeId(2), NodeId(1)));
        assert_eq!(snapshot.neighbors(NodeId(2)), &[NodeId(1), NodeId(3)]);
        assert_eq!(snapshot.edge_length(NodeId(1), NodeId(3)), None);
    }
}
