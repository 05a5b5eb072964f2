//! # Signal Propagation
//!
//! Turns one trigger into a wave of delayed node activations.
//!
//! For every node reachable from the source, the propagator takes the
//! minimum-hop path, makes the regions along it hot, and queues one
//! activation per hop at `hop * propagation_delay_ticks`. Each activation
//! queues its own deactivation `activation_window_ticks` later. Paths to
//! different targets are scheduled independently, so a node shared by
//! several paths is activated once per path.
//!
//! Queued work refers to nodes by id only. A node unregistered before its
//! task fires is skipped at fire time.

use crate::config::NetworkSettings;
use crate::error::NetworkError;
use crate::lifecycle::{AcquireOutcome, HotRegionManager};
use crate::path::PathEngine;
use crate::scheduler::{ScheduledTask, TickScheduler};
use crate::spatial::SpatialIndex;
use crate::types::{NodeId, NodePosition, RegionId};
use crate::world::NodeStateApplier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a single [`SignalPropagator::propagate`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    pub source: NodeId,
    pub strength: u8,
    /// Nodes within the distance budget
    pub reachable: usize,
    /// Paths whose hops were scheduled
    pub paths: usize,
    /// Activation tasks queued
    pub scheduled_hops: usize,
    /// Regions that became hot for this signal
    pub regions_activated: usize,
    /// Regions that were already hot and got refreshed
    pub regions_extended: usize,
    /// Regions refused because the hot pool was full
    pub rejected_regions: Vec<RegionId>,
    /// Regions whose world could not be resolved
    pub unavailable_regions: Vec<RegionId>,
    /// Targets dropped because their path failed validation
    pub skipped_targets: Vec<NodeId>,
}

/// Computes and schedules signal propagation.
pub struct SignalPropagator {
    index: Arc<SpatialIndex>,
    engine: PathEngine,
    regions: Arc<HotRegionManager>,
    scheduler: Arc<TickScheduler>,
    applier: Arc<dyn NodeStateApplier>,
    max_distance: f64,
    hop_delay: u64,
    activation_window: u64,
}

impl std::fmt::Debug for SignalPropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalPropagator")
            .field("max_distance", &self.max_distance)
            .field("hop_delay", &self.hop_delay)
            .field("activation_window", &self.activation_window)
            .finish()
    }
}

impl SignalPropagator {
    pub fn new(
        settings: &NetworkSettings,
        engine: PathEngine,
        regions: Arc<HotRegionManager>,
        scheduler: Arc<TickScheduler>,
        applier: Arc<dyn NodeStateApplier>,
    ) -> Self {
        Self {
            index: engine.graph().index().clone(),
            engine,
            regions,
            scheduler,
            applier,
            max_distance: settings.max_propagation_distance,
            hop_delay: settings.propagation_delay_ticks,
            activation_window: settings.activation_window_ticks,
        }
    }

    /// Propagates a signal of `strength` from the node at `source`.
    ///
    /// Fails only with [`NetworkError::NotFound`] for an unregistered
    /// source. Region failures are recorded in the report and the hops are
    /// still scheduled.
    pub fn propagate(
        &self,
        source: &NodePosition,
        strength: u8,
    ) -> Result<PropagationReport, NetworkError> {
        let origin = self
            .index
            .get(source)
            .ok_or_else(|| NetworkError::NotFound(source.clone()))?;

        let snapshot = self.engine.snapshot();
        let targets = snapshot.reachable(origin.id, self.max_distance);
        let routes = snapshot.route_tree(origin.id);

        let mut report = PropagationReport {
            source: origin.id,
            strength,
            reachable: targets.len(),
            paths: 0,
            scheduled_hops: 0,
            regions_activated: 0,
            regions_extended: 0,
            rejected_regions: Vec::new(),
            unavailable_regions: Vec::new(),
            skipped_targets: Vec::new(),
        };
        let mut healed = false;
        let mut rejected = BTreeSet::new();
        let mut unavailable = BTreeSet::new();

        for target in &targets {
            let Some(path) = routes.path_to(target.id) else {
                debug!(target = %target.position, "No path to reachable target, skipping");
                continue;
            };
            if path.hop_count() == 0 {
                continue;
            }
            if let Err(err) = snapshot.validate_path(&path) {
                warn!(target = %target.position, error = %err, "Dropping invalid path");
                if !healed {
                    self.engine.graph().heal();
                    healed = true;
                }
                report.skipped_targets.push(target.id);
                continue;
            }

            for region in path.required_regions() {
                match self.regions.acquire(&region) {
                    Ok(AcquireOutcome::Activated) => report.regions_activated += 1,
                    Ok(AcquireOutcome::Extended) => report.regions_extended += 1,
                    Err(NetworkError::CapacityExceeded { region, .. }) => {
                        rejected.insert(region);
                    }
                    Err(NetworkError::WorldUnavailable { region, .. }) => {
                        unavailable.insert(region);
                    }
                    Err(err) => {
                        warn!(%region, error = %err, "Unexpected region acquire failure");
                    }
                }
            }

            for (hop, node) in path.nodes().iter().enumerate().skip(1) {
                let fire_at = self.scheduler.schedule(
                    (hop as u64).saturating_mul(self.hop_delay),
                    ScheduledTask::ActivateNode {
                        node: node.id,
                        strength,
                    },
                );
                debug!(node = %node.position, hop, fire_at, "Scheduled hop activation");
                report.scheduled_hops += 1;
            }
            report.paths += 1;
        }

        report.rejected_regions = rejected.into_iter().collect();
        report.unavailable_regions = unavailable.into_iter().collect();

        info!(
            source = %origin.position,
            strength,
            reachable = report.reachable,
            hops = report.scheduled_hops,
            rejected = report.rejected_regions.len(),
            "Propagated signal"
        );
        Ok(report)
    }

    /// Fires an activation. Returns `false` if the node no longer exists.
    pub fn activate(&self, id: NodeId, strength: u8) -> bool {
        let Some(node) = self.index.set_active(id, true) else {
            debug!(node = %id, "Activation target gone, skipping");
            return false;
        };
        self.applier.apply_node_state(&node, true, strength);
        self.scheduler
            .schedule(self.activation_window, ScheduledTask::DeactivateNode { node: id });
        debug!(node = %node.position, strength, "Activated sensor");
        true
    }

    /// Fires a deactivation. Returns `false` if the node no longer exists.
    pub fn deactivate(&self, id: NodeId) -> bool {
        let Some(node) = self.index.set_active(id, false) else {
            debug!(node = %id, "Deactivation target gone, skipping");
            return false;
        };
        self.applier.apply_node_state(&node, false, 0);
        debug!(node = %node.position, "Deactivated sensor");
        true
    }
}
