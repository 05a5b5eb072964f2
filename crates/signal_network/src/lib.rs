//! # Signal Network
//!
//! A registry of positioned sensor nodes that connect to every neighbor within
//! an interaction radius, and a propagation engine that sends a signal from one
//! sensor to everything reachable from it, one hop per delay period.
//!
//! ## Core Features
//!
//! - **Spatial Index**: nodes bucketed by region with two-phase range queries
//! - **Symmetric Graph**: connections always exist on both endpoints
//! - **Deterministic Routing**: minimum-hop paths with a stable tie-break
//! - **Tick Scheduling**: delayed activations driven by an explicit tick clock
//! - **Hot Regions**: a bounded, self-expiring set of regions kept active while
//!   signals cross them
//!
//! ## Architecture Overview
//!
//! [`SignalNetwork`] owns every component and is the only handle an embedder
//! needs. The world side plugs in through three traits in [`world`]:
//! [`RegionActivator`], [`NodeStateApplier`] and [`NodeStore`].
//!
//! ## Quick Start Example
//!
//! ```rust
//! use signal_network::*;
//! use std::sync::Arc;
//!
//! struct World;
//!
//! impl RegionActivator for World {
//!     fn activate_region(&self, _region: &RegionId) -> Result<(), WorldError> {
//!         Ok(())
//!     }
//!     fn deactivate_region(&self, _region: &RegionId) {}
//! }
//!
//! impl NodeStateApplier for World {
//!     fn apply_node_state(&self, _node: &SensorNode, _active: bool, _strength: u8) {}
//! }
//!
//! let world = Arc::new(World);
//! let network = SignalNetwork::new(NetworkSettings::default(), world.clone(), world)?;
//!
//! network.register(NodePosition::new("overworld", 0, 64, 0), NodeOwner::new())?;
//! network.register(NodePosition::new("overworld", 10, 64, 0), NodeOwner::new())?;
//!
//! let report = network.propagate(&NodePosition::new("overworld", 0, 64, 0), 15)?;
//! assert_eq!(report.scheduled_hops, 1);
//!
//! for _ in 0..5 {
//!     network.advance_tick();
//! }
//! assert!(network.get_node(&NodePosition::new("overworld", 10, 64, 0)).unwrap().active);
//! # Ok::<(), NetworkError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod network;
pub mod path;
pub mod propagation;
pub mod scheduler;
pub mod spatial;
pub mod storage;
pub mod types;
pub mod world;

pub use config::NetworkSettings;
pub use error::{NetworkError, WorldError};
pub use graph::{ConnectivityGraph, GraphSnapshot};
pub use lifecycle::{
    spawn_sweeper, AcquireOutcome, Clock, HotRegionEntry, HotRegionManager, HotRegionStats,
    ManualClock, SystemClock,
};
pub use network::{SignalNetwork, TickSummary};
pub use path::{Path, PathEngine, PathNode, ReachableNode, RouteTree};
pub use propagation::{PropagationReport, SignalPropagator};
pub use scheduler::{ScheduledTask, TickScheduler};
pub use spatial::SpatialIndex;
pub use storage::JsonNodeStore;
pub use types::{
    NetworkStats, NodeId, NodeOwner, NodePosition, RegionId, SensorNode, StoredNode, REGION_SIZE,
};
pub use world::{NodeStateApplier, NodeStore, RegionActivator};
