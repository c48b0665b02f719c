//! Engine behavior tests
//!
//! These drive `TrafficEngine` through its public API the way a host would:
//! build a road network, start, tick, edit roads, stop.

use std::cell::RefCell;

use city_traffic::simulation::{
    ArchetypeRegistry, DespawnReason, GridPos, GridRoadNetwork, RoadGraph, SpawnSkip,
    StopHandle, TrafficConfig, TrafficEngine,
};

/// Config with automatic spawning effectively disabled
fn manual_spawn_config(seed: u64) -> TrafficConfig {
    TrafficConfig {
        spawn_interval_base: 1_000_000.0,
        ..TrafficConfig::with_seed(seed)
    }
}

fn straight_road(length: i32) -> GridRoadNetwork {
    let mut network = GridRoadNetwork::new();
    network
        .add_straight_road(GridPos::new(0, 0), GridPos::new(length - 1, 0))
        .unwrap();
    network
}

fn engine_with(network: GridRoadNetwork, config: TrafficConfig) -> TrafficEngine<GridRoadNetwork> {
    TrafficEngine::new(network, ArchetypeRegistry::with_defaults(), config).unwrap()
}

#[test]
fn test_two_node_road_despawns_at_dead_end() {
    let mut engine = engine_with(straight_road(2), manual_spawn_config(1));
    engine.start();

    let vehicle_id = engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();
    assert_eq!(engine.active_count(), 1);

    for _ in 0..200 {
        engine.tick(0.05);
        if engine.active_count() == 0 {
            break;
        }
    }

    assert!(engine.vehicle(vehicle_id).is_none());
    assert_eq!(engine.stats().despawned(DespawnReason::DeadEnd), 1);
    assert_eq!(engine.stats().total_despawned(), 1);
}

#[test]
fn test_removed_target_despawns_vehicle() {
    let mut engine = engine_with(straight_road(4), manual_spawn_config(2));
    engine.start();

    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();
    engine.tick(0.05);
    assert_eq!(engine.active_count(), 1);

    // Bulldoze the road the vehicle is driving towards
    engine.graph_mut().remove_road(GridPos::new(1, 0)).unwrap();

    for _ in 0..200 {
        engine.tick(0.05);
        if engine.active_count() == 0 {
            break;
        }
    }

    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.stats().despawned(DespawnReason::TargetInvalidated), 1);
}

#[test]
fn test_zero_vehicle_cap_never_spawns() {
    let config = TrafficConfig {
        absolute_max_vehicles: 0,
        spawn_interval_base: 0.1,
        ..TrafficConfig::with_seed(3)
    };
    let mut engine = engine_with(GridRoadNetwork::create_test_network(), config);
    engine.start();
    assert_eq!(engine.capacity(), 0);

    for _ in 0..500 {
        engine.tick(0.1);
        assert_eq!(engine.active_count(), 0);
    }

    assert_eq!(engine.stats().total_spawned, 0);
    assert!(engine.stats().skipped(SpawnSkip::AtCapacity) >= 100);
    assert!(engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .is_err());
}

#[test]
fn test_active_vehicles_never_exceed_capacity() {
    let config = TrafficConfig {
        spawn_interval_base: 0.05,
        vehicles_per_road_ratio: 0.1,
        ..TrafficConfig::with_seed(4)
    };
    let mut engine = engine_with(GridRoadNetwork::create_test_network(), config);
    engine.start();
    let capacity = engine.capacity();
    assert!(capacity > 0);

    for _ in 0..2000 {
        engine.tick(0.05);
        assert!(engine.active_count() <= capacity);
    }

    assert!(engine.stats().total_spawned > 0);
    assert!(engine.stats().skipped(SpawnSkip::AtCapacity) > 0);
}

#[test]
fn test_vehicle_speeds_stay_in_bounds() {
    let config = TrafficConfig {
        spawn_interval_base: 0.2,
        ..TrafficConfig::with_seed(5)
    };
    let max_speed = config.max_speed;
    let min_speed = config.min_speed;
    let mut engine = engine_with(GridRoadNetwork::create_test_network(), config);
    engine.start();

    let mut observed = 0;
    for _ in 0..1000 {
        engine.tick(0.05);
        for vehicle in engine.vehicles() {
            assert!(vehicle.speed >= min_speed && vehicle.speed <= max_speed);
            assert!(vehicle.effective_speed > 0.0);
            assert!(vehicle.effective_speed <= vehicle.speed);
            assert!(engine.graph().is_road(vehicle.current_node));
            observed += 1;
        }
    }
    assert!(observed > 0);
}

#[test]
fn test_vehicles_keep_driving_on_connected_network() {
    let config = TrafficConfig {
        spawn_interval_base: 0.5,
        ..TrafficConfig::with_seed(6)
    };
    let mut engine = engine_with(GridRoadNetwork::create_test_network(), config);
    engine.start();

    for _ in 0..2000 {
        engine.tick(0.05);
    }

    let stats = engine.stats();
    assert!(stats.total_spawned > 0);
    // Vehicles should reach decision points, not stall until the stuck timeout
    assert_eq!(stats.despawned(DespawnReason::Stuck), 0);
    assert_eq!(
        stats.total_spawned,
        engine.active_count() + stats.total_despawned()
    );
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let config = TrafficConfig {
        spawn_interval_base: 0.3,
        ..TrafficConfig::with_seed(42)
    };
    let mut first = engine_with(GridRoadNetwork::create_test_network(), config.clone());
    let mut second = engine_with(GridRoadNetwork::create_test_network(), config);
    first.start();
    second.start();

    for _ in 0..500 {
        first.tick(0.05);
        second.tick(0.05);
    }

    let first_positions: Vec<_> = first.vehicles().map(|v| (v.id, v.position)).collect();
    let second_positions: Vec<_> = second.vehicles().map(|v| (v.id, v.position)).collect();
    assert_eq!(first_positions, second_positions);
    assert_eq!(first.stats().total_spawned, second.stats().total_spawned);
}

#[test]
fn test_stuck_vehicle_is_despawned() {
    let config = TrafficConfig {
        stuck_tick_threshold: 5,
        ..manual_spawn_config(7)
    };
    let mut engine = engine_with(straight_road(3), config);
    engine.start();
    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();

    // A zero time step means no vehicle can make progress
    for _ in 0..5 {
        engine.tick(0.0);
    }
    assert_eq!(engine.active_count(), 1);

    engine.tick(0.0);
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.stats().despawned(DespawnReason::Stuck), 1);
}

#[test]
fn test_stop_is_idempotent() {
    let mut engine = engine_with(straight_road(5), manual_spawn_config(8));
    engine.start();
    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();
    engine
        .spawn_vehicle_at(GridPos::new(4, 0), GridPos::new(3, 0))
        .unwrap();
    assert_eq!(engine.active_count(), 2);

    engine.stop();
    assert!(!engine.is_running());
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.stats().despawned(DespawnReason::Stopped), 2);
    assert_eq!(engine.scheduler().cooldown_entries(), 0);

    engine.stop();
    assert_eq!(engine.stats().despawned(DespawnReason::Stopped), 2);

    // Ticking a stopped engine does nothing
    let ticks = engine.stats().ticks;
    engine.tick(0.05);
    assert_eq!(engine.stats().ticks, ticks);

    // And it can be started again
    engine.start();
    assert!(engine.is_running());
    assert!(engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .is_ok());
}

#[test]
fn test_start_is_idempotent() {
    let mut engine = engine_with(straight_road(3), manual_spawn_config(9));
    engine.start();
    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();

    engine.start();
    assert!(engine.is_running());
    assert_eq!(engine.active_count(), 1);
    assert_eq!(engine.scheduler().cooldown_entries(), 1);
}

#[test]
fn test_stop_handle_tears_down_on_next_tick() {
    let mut engine = engine_with(straight_road(4), manual_spawn_config(10));
    engine.start();
    let handle = engine.stop_handle();
    assert!(handle.is_running());

    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();

    handle.request_stop();
    assert!(!engine.is_running());

    engine.tick(0.05);
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.stats().despawned(DespawnReason::Stopped), 1);
}

#[test]
fn test_spawn_requires_running_engine_and_real_neighbor() {
    let mut engine = engine_with(straight_road(3), manual_spawn_config(11));
    assert!(engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .is_err());

    engine.start();
    // Not adjacent
    assert!(engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(2, 0))
        .is_err());
    // Not a road
    assert!(engine
        .spawn_vehicle_at(GridPos::new(0, 5), GridPos::new(0, 4))
        .is_err());
    assert_eq!(engine.active_count(), 0);

    // Three nodes at ratio 0.5 rounds to a cap of two
    assert_eq!(engine.capacity(), 2);
    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();
    engine
        .spawn_vehicle_at(GridPos::new(2, 0), GridPos::new(1, 0))
        .unwrap();
    assert!(engine
        .spawn_vehicle_at(GridPos::new(1, 0), GridPos::new(0, 0))
        .is_err());
}

#[test]
fn test_small_network_waits_for_more_road() {
    let config = TrafficConfig {
        spawn_interval_base: 0.1,
        ..TrafficConfig::with_seed(12)
    };
    let mut network = GridRoadNetwork::new();
    network.add_road(GridPos::new(0, 0));
    let mut engine = engine_with(network, config);

    engine.start();
    assert!(engine.is_running());

    for _ in 0..50 {
        engine.tick(0.1);
    }
    assert_eq!(engine.stats().total_spawned, 0);
    assert!(engine.stats().skipped(SpawnSkip::NetworkTooSmall) > 0);

    engine.graph_mut().add_road(GridPos::new(1, 0));
    for _ in 0..50 {
        engine.tick(0.1);
    }
    assert!(engine.stats().total_spawned > 0);
}

#[test]
fn test_spawned_vehicle_starts_in_right_lane() {
    let mut engine = engine_with(straight_road(3), manual_spawn_config(13));
    engine.start();
    let vehicle_id = engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();

    let lane_offset = engine.config().lane_offset;
    let vehicle = engine.vehicle(vehicle_id).unwrap();
    // Right of +x travel is -z
    assert!((vehicle.position.x - 0.0).abs() < 1e-5);
    assert!((vehicle.position.z + lane_offset).abs() < 1e-5);
    assert!((vehicle.heading - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    assert_eq!(vehicle.current_node, GridPos::new(0, 0));
    assert_eq!(vehicle.target_node, GridPos::new(1, 0));
    assert!(engine.archetypes().get(vehicle.archetype).is_some());
}

#[test]
fn test_render_map_draws_roads_and_vehicles() {
    let network = GridRoadNetwork::from_ascii("###\n..#").unwrap();
    let mut engine = engine_with(network, manual_spawn_config(14));
    assert_eq!(engine.render_map(), vec!["###".to_string(), "..#".to_string()]);

    engine.start();
    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();
    assert_eq!(engine.render_map()[0], ">##");
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = TrafficConfig {
        min_speed: 8.0,
        max_speed: 4.0,
        ..TrafficConfig::default()
    };
    let result = TrafficEngine::new(
        GridRoadNetwork::create_test_network(),
        ArchetypeRegistry::with_defaults(),
        config,
    );
    assert!(result.is_err());
}

/// Road network that stops the engine the first time a vehicle asks where to go next
struct StopAtFirstDecision {
    network: GridRoadNetwork,
    stop_handle: Option<StopHandle>,
    /// Cells looked up after the stop was requested
    queried_after_stop: RefCell<Vec<GridPos>>,
}

impl StopAtFirstDecision {
    fn record(&self, cell: GridPos) {
        if let Some(handle) = &self.stop_handle {
            if !handle.is_running() {
                self.queried_after_stop.borrow_mut().push(cell);
            }
        }
    }
}

impl RoadGraph for StopAtFirstDecision {
    fn all_road_nodes(&self) -> Vec<GridPos> {
        self.network.all_road_nodes()
    }

    fn neighbors(&self, node: GridPos) -> Vec<GridPos> {
        self.record(node);
        if let Some(handle) = &self.stop_handle {
            handle.request_stop();
        }
        self.network.neighbors(node)
    }

    fn is_road(&self, position: GridPos) -> bool {
        self.record(position);
        self.network.is_road(position)
    }
}

#[test]
fn test_stop_mid_tick_skips_remaining_vehicles() {
    let config = TrafficConfig {
        min_speed: 4.0,
        max_speed: 4.0,
        ..manual_spawn_config(15)
    };
    let graph = StopAtFirstDecision {
        network: straight_road(6),
        stop_handle: None,
        queried_after_stop: RefCell::new(Vec::new()),
    };
    let mut engine = TrafficEngine::new(graph, ArchetypeRegistry::with_defaults(), config).unwrap();
    engine.start();

    // Mirror images, so both reach their targets on the same tick
    engine
        .spawn_vehicle_at(GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap();
    engine
        .spawn_vehicle_at(GridPos::new(5, 0), GridPos::new(4, 0))
        .unwrap();

    // The second vehicle's target is gone; updating it at its decision point would despawn it
    engine
        .graph_mut()
        .network
        .remove_road(GridPos::new(4, 0))
        .unwrap();
    let handle = engine.stop_handle();
    engine.graph_mut().stop_handle = Some(handle);

    for _ in 0..20 {
        engine.tick(0.05);
        if !engine.is_running() {
            break;
        }
    }

    // 1 unit at 0.2 per tick: within the arrival radius on the fourth tick
    assert_eq!(engine.stats().ticks, 4);
    assert!(!engine.is_running());
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.stats().despawned(DespawnReason::Stopped), 2);
    assert_eq!(engine.stats().despawned(DespawnReason::TargetInvalidated), 0);
    assert!(!engine
        .graph()
        .queried_after_stop
        .borrow()
        .contains(&GridPos::new(4, 0)));
}

#[test]
fn test_render_map_refuses_huge_bounding_box() {
    let mut network = GridRoadNetwork::new();
    network.add_road(GridPos::new(i32::MIN, 0));
    network.add_road(GridPos::new(i32::MAX, 0));
    let engine = engine_with(network, manual_spawn_config(16));

    let lines = engine.render_map();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("too large"));
}
