//! # Path Engine
//!
//! Reachability and routing over the connectivity graph.
//!
//! - [`GraphSnapshot::reachable`] runs a best-first traversal weighted by
//!   Euclidean edge length and keeps every node whose cheapest route from the
//!   source fits in the distance budget.
//! - [`GraphSnapshot::route_tree`] runs a breadth-first traversal by hop
//!   count. Neighbors are expanded in position order and the first discovery
//!   wins, so equal-length routes always resolve the same way.
//!
//! All traversals run on an immutable [`GraphSnapshot`].

use crate::error::{invariant_violation, NetworkError};
use crate::graph::{ConnectivityGraph, GraphSnapshot};
use crate::types::{NodeId, NodePosition, RegionId};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};

/// One node along a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: NodeId,
    pub position: NodePosition,
}

/// A node found by [`GraphSnapshot::reachable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachableNode {
    pub id: NodeId,
    pub position: NodePosition,
    /// Cumulative length of the cheapest route from the source
    pub distance: f64,
}

/// An ordered, non-empty sequence of connected nodes from a source to a
/// target, both included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    nodes: Vec<PathNode>,
}

impl Path {
    /// Builds a path from its nodes. Returns `None` for an empty sequence.
    pub fn new(nodes: Vec<PathNode>) -> Option<Self> {
        if nodes.is_empty() {
            return None;
        }
        Some(Self { nodes })
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn source(&self) -> &PathNode {
        &self.nodes[0]
    }

    pub fn target(&self) -> &PathNode {
        &self.nodes[self.nodes.len() - 1]
    }

    /// Number of nodes on the path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a constructed path.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges traversed.
    pub fn hop_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|node| node.id)
    }

    /// Deduplicated regions the path passes through.
    pub fn required_regions(&self) -> BTreeSet<RegionId> {
        self.nodes.iter().map(|node| node.position.region()).collect()
    }
}

/// Breadth-first tree of minimum-hop routes rooted at one source.
#[derive(Debug, Clone)]
pub struct RouteTree {
    source: NodeId,
    parents: HashMap<NodeId, NodeId>,
    positions: HashMap<NodeId, NodePosition>,
}

impl RouteTree {
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Whether `target` can be reached from the source at all.
    pub fn reaches(&self, target: NodeId) -> bool {
        target != self.source && self.parents.contains_key(&target)
    }

    /// Minimum-hop path from the source to `target`. `None` when `target` is
    /// the source itself or is not connected to it.
    pub fn path_to(&self, target: NodeId) -> Option<Path> {
        if !self.reaches(target) {
            return None;
        }
        let mut ids = vec![target];
        let mut current = target;
        while current != self.source {
            current = *self.parents.get(&current)?;
            ids.push(current);
        }
        ids.reverse();

        let nodes = ids
            .into_iter()
            .map(|id| {
                self.positions.get(&id).map(|position| PathNode {
                    id,
                    position: position.clone(),
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Path::new(nodes)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    distance: f64,
    id: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl GraphSnapshot {
    /// Nodes whose cheapest route from `source` is at most
    /// `max_total_distance` long, ordered by position. The source itself is
    /// never included; an unknown source reaches nothing.
    pub fn reachable(&self, source: NodeId, max_total_distance: f64) -> Vec<ReachableNode> {
        if !self.contains(source) || max_total_distance.is_nan() || max_total_distance < 0.0 {
            return Vec::new();
        }

        let mut best: HashMap<NodeId, f64> = HashMap::from([(source, 0.0)]);
        let mut settled: BTreeSet<NodeId> = BTreeSet::new();
        let mut frontier = BinaryHeap::from([Reverse(Frontier {
            distance: 0.0,
            id: source,
        })]);

        while let Some(Reverse(Frontier { distance, id })) = frontier.pop() {
            if !settled.insert(id) {
                continue;
            }
            for &next in self.neighbors(id) {
                if settled.contains(&next) {
                    continue;
                }
                let Some(length) = self.edge_length(id, next) else {
                    continue;
                };
                let candidate = distance + length;
                if candidate > max_total_distance {
                    continue;
                }
                let improves = best.get(&next).map_or(true, |known| candidate < *known);
                if improves {
                    best.insert(next, candidate);
                    frontier.push(Reverse(Frontier {
                        distance: candidate,
                        id: next,
                    }));
                }
            }
        }

        let mut reached: Vec<ReachableNode> = best
            .into_iter()
            .filter(|(id, _)| *id != source)
            .filter_map(|(id, distance)| {
                self.position(id).map(|position| ReachableNode {
                    id,
                    position: position.clone(),
                    distance,
                })
            })
            .collect();
        reached.sort_by(|a, b| a.position.cmp(&b.position));
        reached
    }

    /// Breadth-first route tree from `source`.
    pub fn route_tree(&self, source: NodeId) -> RouteTree {
        let mut parents = HashMap::new();
        let mut positions = HashMap::new();
        if let Some(position) = self.position(source) {
            positions.insert(source, position.clone());

            let mut queue = VecDeque::from([source]);
            while let Some(id) = queue.pop_front() {
                for &next in self.neighbors(id) {
                    if next == source || parents.contains_key(&next) {
                        continue;
                    }
                    let Some(position) = self.position(next) else {
                        continue;
                    };
                    parents.insert(next, id);
                    positions.insert(next, position.clone());
                    queue.push_back(next);
                }
            }
        }
        RouteTree {
            source,
            parents,
            positions,
        }
    }

    /// Minimum-hop path between two nodes of this snapshot.
    pub fn shortest_path(&self, source: NodeId, target: NodeId) -> Option<Path> {
        if source == target {
            return None;
        }
        self.route_tree(source).path_to(target)
    }

    /// Checks that consecutive nodes of `path` are connected here.
    ///
    /// A disconnected path means the routing code is broken; see
    /// [`invariant_violation`] for how that is reported.
    pub fn validate_path(&self, path: &Path) -> Result<(), NetworkError> {
        for pair in path.nodes().windows(2) {
            if !self.is_edge(pair[0].id, pair[1].id) {
                return Err(invariant_violation(format!(
                    "path hop {} -> {} is not an edge",
                    pair[0].position, pair[1].position
                )));
            }
        }
        Ok(())
    }
}

/// Routing front-end over a [`ConnectivityGraph`]. Each query works on a
/// fresh snapshot.
#[derive(Debug, Clone)]
pub struct PathEngine {
    graph: ConnectivityGraph,
}

impl PathEngine {
    pub fn new(graph: ConnectivityGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.snapshot()
    }

    /// See [`GraphSnapshot::reachable`].
    pub fn reachable(&self, source: NodeId, max_total_distance: f64) -> Vec<ReachableNode> {
        self.snapshot().reachable(source, max_total_distance)
    }

    /// See [`GraphSnapshot::shortest_path`].
    pub fn shortest_path(&self, source: NodeId, target: NodeId) -> Option<Path> {
        self.snapshot().shortest_path(source, target)
    }

    /// Regions that must be hot before any hop of `path` is activated.
    pub fn required_regions(path: &Path) -> BTreeSet<RegionId> {
        path.required_regions()
    }
}
