//! # Signal Network
//!
//! [`SignalNetwork`] is the context handle that owns and wires every
//! component: registry, connectivity graph, path engine, tick scheduler,
//! hot-region manager and propagator. Embedders hold one instance and pass
//! it around explicitly; nothing here is global.
//!
//! The embedding application drives time by calling
//! [`advance_tick`](SignalNetwork::advance_tick) once per world tick and
//! [`sweep`](SignalNetwork::sweep) periodically (or via
//! [`spawn_sweeper`](crate::lifecycle::spawn_sweeper) on
//! [`regions`](SignalNetwork::regions)).

use crate::config::NetworkSettings;
use crate::error::NetworkError;
use crate::graph::ConnectivityGraph;
use crate::lifecycle::{Clock, HotRegionManager, SystemClock};
use crate::path::PathEngine;
use crate::propagation::{PropagationReport, SignalPropagator};
use crate::scheduler::{ScheduledTask, TickScheduler};
use crate::spatial::SpatialIndex;
use crate::types::{NetworkStats, NodeOwner, NodePosition, RegionId, SensorNode, StoredNode};
use crate::world::{NodeStateApplier, NodeStore, RegionActivator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one [`advance_tick`](SignalNetwork::advance_tick) fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// The tick that was just entered
    pub tick: u64,
    pub activated: usize,
    pub deactivated: usize,
    /// Node tasks whose target had been unregistered
    pub stale: usize,
    /// Regions released by their deferred expiry check
    pub released: usize,
}

/// The sensor network and everything needed to run it.
#[derive(Debug)]
pub struct SignalNetwork {
    settings: NetworkSettings,
    index: Arc<SpatialIndex>,
    graph: ConnectivityGraph,
    scheduler: Arc<TickScheduler>,
    regions: Arc<HotRegionManager>,
    propagator: SignalPropagator,
}

impl SignalNetwork {
    /// Builds a network on the system clock.
    pub fn new(
        settings: NetworkSettings,
        activator: Arc<dyn RegionActivator>,
        applier: Arc<dyn NodeStateApplier>,
    ) -> Result<Self, NetworkError> {
        Self::with_clock(settings, activator, applier, Arc::new(SystemClock))
    }

    /// Builds a network whose hot-region lifetimes follow `clock`.
    pub fn with_clock(
        settings: NetworkSettings,
        activator: Arc<dyn RegionActivator>,
        applier: Arc<dyn NodeStateApplier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NetworkError> {
        settings.validate()?;

        let index = Arc::new(SpatialIndex::new(settings.interaction_radius));
        let graph = ConnectivityGraph::new(index.clone());
        let scheduler = Arc::new(TickScheduler::new());
        let regions = Arc::new(HotRegionManager::new(
            &settings,
            activator,
            scheduler.clone(),
            clock,
        ));
        let propagator = SignalPropagator::new(
            &settings,
            PathEngine::new(graph.clone()),
            regions.clone(),
            scheduler.clone(),
            applier,
        );

        info!(
            radius = settings.interaction_radius,
            max_distance = settings.max_propagation_distance,
            capacity = settings.max_hot_regions,
            "Signal network initialized"
        );
        Ok(Self {
            settings,
            index,
            graph,
            scheduler,
            regions,
            propagator,
        })
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Registers a sensor and connects it to its neighbors.
    pub fn register(
        &self,
        position: NodePosition,
        owner: NodeOwner,
    ) -> Result<SensorNode, NetworkError> {
        self.index.register(position, owner)
    }

    /// Removes a sensor and every connection to it.
    pub fn unregister(&self, position: &NodePosition) -> Result<SensorNode, NetworkError> {
        self.index.unregister(position)
    }

    pub fn is_registered(&self, position: &NodePosition) -> bool {
        self.index.is_registered(position)
    }

    pub fn get_node(&self, position: &NodePosition) -> Option<SensorNode> {
        self.index.get(position)
    }

    pub fn list_nodes(&self) -> Vec<SensorNode> {
        self.index.list()
    }

    pub fn stats(&self) -> NetworkStats {
        self.index.stats()
    }

    pub fn sensors_in_range(&self, center: &NodePosition, max_distance: f64) -> Vec<SensorNode> {
        self.index.sensors_in_range(center, max_distance)
    }

    pub fn sensors_in_region(&self, region: &RegionId) -> Vec<SensorNode> {
        self.index.sensors_in_region(region)
    }

    /// Sends a signal from the sensor at `source`.
    pub fn propagate(
        &self,
        source: &NodePosition,
        strength: u8,
    ) -> Result<PropagationReport, NetworkError> {
        self.propagator.propagate(source, strength)
    }

    /// Moves the tick clock forward by one and runs everything due.
    pub fn advance_tick(&self) -> TickSummary {
        let (tick, tasks) = self.scheduler.advance();
        let mut summary = TickSummary {
            tick,
            ..Default::default()
        };

        for task in tasks {
            match task {
                ScheduledTask::ActivateNode { node, strength } => {
                    if self.propagator.activate(node, strength) {
                        summary.activated += 1;
                    } else {
                        summary.stale += 1;
                    }
                }
                ScheduledTask::DeactivateNode { node } => {
                    if self.propagator.deactivate(node) {
                        summary.deactivated += 1;
                    } else {
                        summary.stale += 1;
                    }
                }
                ScheduledTask::ReleaseCheck { region } => {
                    if self.regions.release_if_expired(&region) {
                        summary.released += 1;
                    }
                }
            }
        }

        if summary.activated + summary.deactivated + summary.released > 0 {
            debug!(
                tick,
                activated = summary.activated,
                deactivated = summary.deactivated,
                released = summary.released,
                "Tick processed"
            );
        }
        summary
    }

    /// Releases every hot region idle past its lifetime.
    pub fn sweep(&self) -> Vec<RegionId> {
        self.regions.sweep()
    }

    /// Checks connection symmetry, rebuilding the graph if it is broken.
    pub fn check_integrity(&self) -> Result<(), NetworkError> {
        self.graph.verify_symmetry()
    }

    /// Rebuilds every connection from scratch.
    pub fn recompute_all(&self) -> NetworkStats {
        self.graph.recompute_all()
    }

    /// Registers every node held by `store`. Records at an occupied position
    /// are skipped. Returns how many nodes were registered.
    pub async fn restore(&self, store: &dyn NodeStore) -> Result<usize, NetworkError> {
        let stored = store.load_nodes().await?;
        let total = stored.len();
        let mut restored = 0;
        for node in stored {
            match self.register(node.position, node.owner) {
                Ok(_) => restored += 1,
                Err(err) => warn!(error = %err, "Skipping saved sensor"),
            }
        }
        info!(restored, skipped = total - restored, stats = %self.stats(), "Restored network");
        Ok(restored)
    }

    /// Writes every registered node to `store`. Returns how many were saved.
    pub async fn persist(&self, store: &dyn NodeStore) -> Result<usize, NetworkError> {
        let nodes: Vec<StoredNode> = self.list_nodes().iter().map(StoredNode::from).collect();
        store.save_nodes(&nodes).await?;
        Ok(nodes.len())
    }

    /// Drops pending work, turns every lit sensor off and releases every hot
    /// region. Call once, at teardown.
    pub fn shutdown(&self) -> usize {
        let dropped = self.scheduler.clear();
        for node in self.list_nodes().into_iter().filter(|node| node.active) {
            self.propagator.deactivate(node.id);
        }
        let released = self.regions.shutdown();
        info!(dropped, released, stats = %self.stats(), "Signal network shut down");
        released
    }

    pub fn index(&self) -> &Arc<SpatialIndex> {
        &self.index
    }

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    pub fn regions(&self) -> &Arc<HotRegionManager> {
        &self.regions
    }

    pub fn scheduler(&self) -> &Arc<TickScheduler> {
        &self.scheduler
    }

    pub fn current_tick(&self) -> u64 {
        self.scheduler.current_tick()
    }
}
