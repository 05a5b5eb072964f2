//! End-to-end scenarios for the sensor network
//!
//! These tests drive the public API only: registry, propagation on the tick
//! clock, and the hot-region pool under capacity and lifetime limits.

use parking_lot::Mutex;
use signal_network::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// In-memory world that accepts every region and records state changes.
#[derive(Default)]
struct TestWorld {
    active_regions: Mutex<HashSet<RegionId>>,
    applied: Mutex<Vec<(NodePosition, bool, u8)>>,
}

impl RegionActivator for TestWorld {
    fn activate_region(&self, region: &RegionId) -> Result<(), WorldError> {
        if region.world == "missing" {
            return Err(WorldError::WorldNotFound(region.world.clone()));
        }
        self.active_regions.lock().insert(region.clone());
        Ok(())
    }

    fn deactivate_region(&self, region: &RegionId) {
        self.active_regions.lock().remove(region);
    }
}

impl NodeStateApplier for TestWorld {
    fn apply_node_state(&self, node: &SensorNode, active: bool, strength: u8) {
        self.applied
            .lock()
            .push((node.position.clone(), active, strength));
    }
}

fn create_test_network(settings: NetworkSettings) -> (SignalNetwork, Arc<TestWorld>, Arc<ManualClock>) {
    let world = Arc::new(TestWorld::default());
    let clock = Arc::new(ManualClock::new());
    let network =
        SignalNetwork::with_clock(settings, world.clone(), world.clone(), clock.clone())
            .expect("default settings are valid");
    (network, world, clock)
}

fn at(x: i32, y: i32, z: i32) -> NodePosition {
    NodePosition::new("W", x, y, z)
}

fn register(network: &SignalNetwork, position: NodePosition) -> SensorNode {
    network
        .register(position, NodeOwner::new())
        .expect("position should be free")
}

/// Every connection must be mirrored on the peer.
fn assert_symmetric(network: &SignalNetwork) {
    let nodes = network.list_nodes();
    for node in &nodes {
        for peer in &node.connections {
            let other = nodes
                .iter()
                .find(|candidate| candidate.id == *peer)
                .expect("connection to an unregistered node");
            assert!(
                other.connections.contains(&node.id),
                "{} -> {} is one-sided",
                node.position,
                other.position
            );
        }
    }
    network.check_integrity().expect("graph should be symmetric");
}

#[test]
fn test_nearby_sensors_connect_and_distant_ones_do_not() {
    let (network, _, _) = create_test_network(NetworkSettings::default());
    let a = register(&network, at(0, 0, 0));
    let b = register(&network, at(10, 0, 0));

    let a = network.get_node(&a.position).unwrap();
    assert!(a.connections.contains(&b.id));
    assert!(network.get_node(&b.position).unwrap().connections.contains(&a.id));

    let far = register(&network, at(1000, 0, 0));
    assert!(far.connections.is_empty());
    assert_eq!(network.get_node(&a.position).unwrap().connections.len(), 1);

    let stats = network.stats();
    assert_eq!(stats.sensor_count, 3);
    assert_eq!(stats.connection_count, 1);
    assert_symmetric(&network);
}

#[test]
fn test_two_hop_propagation_timing() {
    let (network, world, _) = create_test_network(NetworkSettings::default());
    register(&network, at(0, 0, 0));
    let hop1 = register(&network, at(12, 0, 0)).position;
    let hop2 = register(&network, at(24, 0, 0)).position;

    let report = network.propagate(&at(0, 0, 0), 3).unwrap();
    assert_eq!(report.reachable, 2);

    let mut hop1_active = Vec::new();
    let mut hop2_active = Vec::new();
    for _ in 0..25 {
        let summary = network.advance_tick();
        if network.get_node(&hop1).unwrap().active {
            hop1_active.push(summary.tick);
        }
        if network.get_node(&hop2).unwrap().active {
            hop2_active.push(summary.tick);
        }
    }

    assert_eq!(hop1_active, (5..15).collect::<Vec<u64>>());
    assert_eq!(hop2_active, (10..20).collect::<Vec<u64>>());

    let applied = world.applied.lock();
    assert!(applied.contains(&(hop1.clone(), true, 3)));
    assert!(applied.contains(&(hop2.clone(), true, 3)));
    assert_eq!(applied.last(), Some(&(hop2, false, 0)));
}

#[test]
fn test_capacity_of_one_rejects_second_region() {
    let settings = NetworkSettings {
        max_hot_regions: 1,
        ..NetworkSettings::default()
    };
    let (network, world, _) = create_test_network(settings);
    let regions = network.regions().clone();
    let first = RegionId::new("W", 0, 0);
    let second = RegionId::new("W", 40, 40);

    let barrier = Arc::new(Barrier::new(2));
    let results: Vec<Result<AcquireOutcome, NetworkError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|region| {
                let regions = regions.clone();
                let barrier = barrier.clone();
                scope.spawn(move || {
                    barrier.wait();
                    regions.acquire(&region)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(NetworkError::CapacityExceeded { capacity: 1, .. })))
        .count();
    assert_eq!((accepted, rejected), (1, 1));
    assert_eq!(regions.hot_count(), 1);
    assert_eq!(world.active_regions.lock().len(), 1);

    // Whichever region won stays hot after the loser's attempt
    let winner = if regions.is_hot(&first) { first } else { second };
    assert!(regions.is_hot(&winner));
    assert!(matches!(regions.acquire(&winner), Ok(AcquireOutcome::Extended)));
}

#[test]
fn test_hot_region_expires_after_lifetime_and_not_before() {
    let (network, world, clock) = create_test_network(NetworkSettings::default());
    let region = RegionId::new("W", 0, 0);
    network.regions().acquire(&region).unwrap();

    clock.advance(Duration::from_millis(20_000));
    network.regions().acquire(&region).unwrap();

    clock.advance(Duration::from_millis(30_000));
    assert!(network.sweep().is_empty());
    assert!(world.active_regions.lock().contains(&region));

    clock.advance(Duration::from_millis(1));
    assert_eq!(network.sweep(), vec![region.clone()]);
    assert!(!network.regions().is_hot(&region));
    assert!(world.active_regions.lock().is_empty());
}

#[test]
fn test_unavailable_world_is_abandoned() {
    let (network, world, _) = create_test_network(NetworkSettings::default());
    let position = NodePosition::new("missing", 0, 0, 0);
    network.register(position.clone(), NodeOwner::new()).unwrap();
    network
        .register(NodePosition::new("missing", 5, 0, 0), NodeOwner::new())
        .unwrap();

    let report = network.propagate(&position, 8).unwrap();
    assert_eq!(report.unavailable_regions, vec![RegionId::new("missing", 0, 0)]);
    assert_eq!(report.scheduled_hops, 1);
    assert_eq!(network.regions().hot_count(), 0);

    // The hop still fires even though the region never became hot
    for _ in 0..5 {
        network.advance_tick();
    }
    assert_eq!(world.applied.lock().len(), 1);
}

#[test]
fn test_unregister_mid_flight_is_noop() {
    let (network, world, _) = create_test_network(NetworkSettings::default());
    register(&network, at(0, 0, 0));
    register(&network, at(10, 0, 0));
    register(&network, at(20, 0, 0));

    network.propagate(&at(0, 0, 0), 15).unwrap();
    for _ in 0..5 {
        network.advance_tick();
    }
    network.unregister(&at(20, 0, 0)).unwrap();
    network.unregister(&at(10, 0, 0)).unwrap();
    // Fresh node at a vacated position must not be touched by old tasks
    let replacement = register(&network, at(10, 0, 0));

    let mut stale = 0;
    for _ in 0..20 {
        stale += network.advance_tick().stale;
    }
    assert!(stale > 0);
    assert!(!network.get_node(&replacement.position).unwrap().active);
    assert!(world
        .applied
        .lock()
        .iter()
        .all(|(position, active, _)| *position == at(10, 0, 0) && *active));
}

#[test]
fn test_absent_targets_are_noops() {
    let (network, world, _) = create_test_network(NetworkSettings::default());
    register(&network, at(0, 0, 0));
    let before = network.stats();

    assert!(matches!(
        network.unregister(&at(99, 0, 0)),
        Err(NetworkError::NotFound(_))
    ));
    assert!(!network.regions().release(&RegionId::new("W", 5, 5)));
    assert_eq!(network.stats(), before);
    assert!(world.active_regions.lock().is_empty());
    assert_eq!(network.regions().stats().releases, 0);
}

#[test]
fn test_symmetry_and_range_queries_under_churn() {
    let (network, _, _) = create_test_network(NetworkSettings::default());
    let mut seed: u64 = 0x5eed;
    let mut next = move |bound: i32| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((seed >> 33) % bound as u64) as i32 - bound / 2
    };

    let mut live: Vec<NodePosition> = Vec::new();
    for step in 0..300 {
        if step % 4 == 3 && !live.is_empty() {
            let victim = live.swap_remove((next(1000) + 500) as usize % live.len());
            network.unregister(&victim).unwrap();
        } else {
            let position = at(next(120), next(16), next(120));
            if network.register(position.clone(), NodeOwner::new()).is_ok() {
                live.push(position);
            }
        }
        assert_symmetric(&network);
    }

    for radius in [0.0, 7.5, 16.0, 40.0, 250.0] {
        let center = at(next(120), 0, next(120));
        let found: HashSet<NodePosition> = network
            .sensors_in_range(&center, radius)
            .into_iter()
            .map(|node| node.position)
            .collect();
        let expected: HashSet<NodePosition> = live
            .iter()
            .filter(|position| position.distance(&center).unwrap() <= radius)
            .cloned()
            .collect();
        assert_eq!(found, expected, "radius {radius}");
    }

    let stats = network.recompute_all();
    assert_eq!(stats.sensor_count, live.len());
    assert_symmetric(&network);
}

#[test]
fn test_concurrent_registration_keeps_graph_symmetric() {
    let (network, _, _) = create_test_network(NetworkSettings::default());
    let network = Arc::new(network);
    register(&network, at(0, 0, 0));

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let network = network.clone();
            scope.spawn(move || {
                for i in 0..50 {
                    let position = at(i * 3, worker + 1, (i % 5) * 4);
                    network.register(position.clone(), NodeOwner::new()).unwrap();
                    if i % 3 == 0 {
                        network.unregister(&position).unwrap();
                    }
                }
            });
        }
        let network = network.clone();
        scope.spawn(move || {
            for _ in 0..20 {
                network.propagate(&at(0, 0, 0), 1).unwrap();
                network.advance_tick();
            }
        });
    });

    assert_symmetric(&network);
    assert_eq!(network.stats().sensor_count, 1 + 4 * 33);
}
