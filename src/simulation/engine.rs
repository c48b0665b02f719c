//! Traffic engine that ties everything together
//!
//! The host calls `tick` once per frame. Each tick runs the spawn scheduler
//! once, freezes a snapshot of every vehicle, then updates each vehicle once in
//! spawn order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::archetype::ArchetypeRegistry;
use super::config::TrafficConfig;
use super::movement::TrafficSnapshot;
use super::road_graph::RoadGraph;
use super::spawner::{sample_speed, SpawnDecision, SpawnPlan, SpawnScheduler, SpawnSkip};
use super::stats::TrafficStats;
use super::types::{GridPos, Position, SimId, VehicleId};
use super::vehicle::{AgentUpdateResult, DespawnReason, VehicleAgent};

/// Largest bounding box `render_map` will draw
const MAX_MAP_CELLS: u64 = 250_000;

/// Cloneable handle that can stop a running engine from elsewhere
///
/// Vehicles still waiting for their update in the current tick check the flag
/// and stop without moving; the engine then tears down as if `stop` was called.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// The ambient traffic simulation
pub struct TrafficEngine<G: RoadGraph> {
    /// Road network, edited by the host between ticks
    graph: G,

    archetypes: ArchetypeRegistry,

    config: TrafficConfig,

    /// Active vehicles; ids grow monotonically so this iterates in spawn order
    vehicles: BTreeMap<VehicleId, VehicleAgent>,

    scheduler: SpawnScheduler,

    running: Arc<AtomicBool>,

    /// Next ID to assign
    next_id: usize,

    /// Simulation time
    time: f32,

    rng: StdRng,

    stats: TrafficStats,
}

impl<G: RoadGraph> TrafficEngine<G> {
    pub fn new(graph: G, archetypes: ArchetypeRegistry, config: TrafficConfig) -> Result<Self> {
        config.validate().context("Invalid traffic configuration")?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            graph,
            archetypes,
            config,
            vehicles: BTreeMap::new(),
            scheduler: SpawnScheduler::new(),
            running: Arc::new(AtomicBool::new(false)),
            next_id: 0,
            time: 0.0,
            rng,
            stats: TrafficStats::default(),
        })
    }

    /// Begin spawning and moving vehicles
    ///
    /// A network with fewer than two road nodes is accepted; spawn attempts
    /// are skipped until the road editor grows it.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        self.scheduler.reset(&self.config, &mut self.rng);
        self.running.store(true, Ordering::Release);

        let road_nodes = self.graph.node_count();
        if road_nodes < 2 {
            info!(
                "Traffic started on a network of {} road node(s); waiting for more road",
                road_nodes
            );
        } else {
            info!(
                "Traffic started: {} road nodes, capacity {}",
                road_nodes,
                self.capacity()
            );
        }
    }

    /// Stop the simulation and remove every vehicle. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);

        let removed = self.vehicles.len();
        for _ in 0..removed {
            self.stats.record_despawn(DespawnReason::Stopped);
        }
        self.vehicles.clear();
        self.scheduler.clear();

        if was_running || removed > 0 {
            info!("Traffic stopped, removed {} vehicle(s)", removed);
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Advance the simulation by `delta_secs`
    pub fn tick(&mut self, delta_secs: f32) {
        if !self.is_running() {
            if !self.vehicles.is_empty() {
                self.stop();
            }
            return;
        }

        self.time += delta_secs;
        self.stats.ticks += 1;
        self.stats.elapsed_time += delta_secs;

        self.run_scheduler(delta_secs);

        let snapshot = TrafficSnapshot::capture(self.vehicles.values(), &self.config);
        let vehicle_ids: Vec<VehicleId> = self.vehicles.keys().copied().collect();
        let mut despawned = Vec::new();

        for vehicle_id in vehicle_ids {
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) else {
                continue;
            };

            match vehicle.update(
                delta_secs,
                &self.graph,
                &snapshot,
                &self.config,
                &mut self.rng,
            ) {
                AgentUpdateResult::Continue => {}
                AgentUpdateResult::Despawn(reason) => despawned.push((vehicle_id, reason)),
            }
        }

        for (vehicle_id, reason) in despawned {
            self.despawn_vehicle(vehicle_id, reason);
        }

        // Stop requested through a handle while vehicles were updating
        if !self.is_running() {
            self.stop();
        }
    }

    /// Spawn a vehicle at `start` heading for its neighbor `target`
    ///
    /// Bypasses the spawn timer and cooldowns but not the vehicle cap.
    pub fn spawn_vehicle_at(&mut self, start: GridPos, target: GridPos) -> Result<VehicleId> {
        if !self.is_running() {
            bail!("Traffic simulation is not running");
        }
        if !self.graph.is_road(start) {
            bail!("No road at spawn point {:?}", start);
        }
        if !self.graph.neighbors(start).contains(&target) {
            bail!("{:?} is not a road neighbor of {:?}", target, start);
        }

        let capacity = self.capacity();
        if self.vehicles.len() >= capacity {
            bail!("Vehicle capacity of {} reached", capacity);
        }

        let archetype = self
            .archetypes
            .pick(&mut self.rng)
            .context("No vehicle archetypes registered")?;

        self.scheduler.record_spawn(start, self.time);
        let speed = sample_speed(&self.config, &mut self.rng);

        Ok(self.insert_vehicle(SpawnPlan {
            start,
            target,
            speed,
            archetype,
        }))
    }

    /// Maximum simultaneous vehicles for the current network size
    pub fn capacity(&self) -> usize {
        self.config.capacity(self.graph.node_count())
    }

    pub fn active_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn vehicle(&self, vehicle_id: VehicleId) -> Option<&VehicleAgent> {
        self.vehicles.get(&vehicle_id)
    }

    /// Active vehicles in spawn order
    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleAgent> {
        self.vehicles.values()
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn config(&self) -> &TrafficConfig {
        &self.config
    }

    pub fn archetypes(&self) -> &ArchetypeRegistry {
        &self.archetypes
    }

    pub fn scheduler(&self) -> &SpawnScheduler {
        &self.scheduler
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Mutable access for the road editor; vehicles re-validate on their next decision
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    fn run_scheduler(&mut self, delta_secs: f32) {
        let capacity = self.capacity();
        let decision = self.scheduler.tick(
            delta_secs,
            self.time,
            self.vehicles.len(),
            capacity,
            &self.graph,
            &self.archetypes,
            &self.config,
            &mut self.rng,
        );

        match decision {
            SpawnDecision::Spawn(plan) => {
                self.insert_vehicle(plan);
            }
            SpawnDecision::Skip(SpawnSkip::NotDue) => {}
            SpawnDecision::Skip(reason) => {
                debug!("Spawn attempt skipped: {:?}", reason);
                self.stats.record_skip(reason);
            }
        }
    }

    fn insert_vehicle(&mut self, plan: SpawnPlan) -> VehicleId {
        let vehicle_id = VehicleId(SimId(self.next_id));
        self.next_id += 1;

        let vehicle = VehicleAgent::new(
            vehicle_id,
            plan.archetype,
            plan.start,
            plan.target,
            plan.speed,
            &self.config,
        );
        debug!(
            "Spawned vehicle {:?} at {:?} heading for {:?} at {:.2}",
            vehicle_id, plan.start, plan.target, plan.speed
        );

        self.vehicles.insert(vehicle_id, vehicle);
        self.stats.total_spawned += 1;
        vehicle_id
    }

    fn despawn_vehicle(&mut self, vehicle_id: VehicleId, reason: DespawnReason) {
        if let Some(vehicle) = self.vehicles.remove(&vehicle_id) {
            debug!(
                "Despawned vehicle {:?} at {:?}: {:?}",
                vehicle_id, vehicle.current_node, reason
            );
            self.stats.record_despawn(reason);
        }
    }

    /// Print a summary of the simulation state
    pub fn print_summary(&self) {
        println!("=== Traffic Summary ===");
        println!("Time: {:.2}s", self.time);
        println!(
            "Road nodes: {}, Vehicles: {}/{}",
            self.graph.node_count(),
            self.vehicles.len(),
            self.capacity()
        );
        println!("{}", self.stats.summary());

        if !self.vehicles.is_empty() {
            println!("--- Active Vehicles ---");
            for vehicle in self.vehicles.values() {
                let archetype = self
                    .archetypes
                    .get(vehicle.archetype)
                    .map(|a| a.name.as_str())
                    .unwrap_or("?");
                println!(
                    "  Vehicle {:?} ({}): {:?} -> {:?}, speed={:.1}/{:.1}, position=({:.1}, {:.1})",
                    vehicle.id.0 .0,
                    archetype,
                    vehicle.current_node,
                    vehicle.target_node,
                    vehicle.effective_speed,
                    vehicle.speed,
                    vehicle.position.x,
                    vehicle.position.z
                );
            }
        }
    }

    /// Draw the road network and vehicles in the terminal
    pub fn draw_map(&self) {
        for line in self.render_map() {
            println!("{}", line);
        }
    }

    /// Render the road network as text, one string per grid row
    ///
    /// Roads are `#`, vehicles are arrows pointing along their heading.
    pub fn render_map(&self) -> Vec<String> {
        let nodes = self.graph.all_road_nodes();
        let Some(first) = nodes.first() else {
            return vec!["(no roads)".to_string()];
        };

        let (mut min, mut max) = (*first, *first);
        for node in &nodes {
            min = GridPos::new(min.x.min(node.x), min.z.min(node.z));
            max = GridPos::new(max.x.max(node.x), max.z.max(node.z));
        }

        let width = u64::from(max.x.abs_diff(min.x)) + 1;
        let height = u64::from(max.z.abs_diff(min.z)) + 1;
        if width * height > MAX_MAP_CELLS {
            return vec![format!("(map too large to draw: {} x {} cells)", width, height)];
        }
        let mut canvas = vec![vec!['.'; width as usize]; height as usize];

        for node in &nodes {
            canvas[node.z.abs_diff(min.z) as usize][node.x.abs_diff(min.x) as usize] = '#';
        }

        for vehicle in self.vehicles.values() {
            let cell = GridPos::from_world(&vehicle.position, self.config.cell_size);
            if cell.x < min.x || cell.x > max.x || cell.z < min.z || cell.z > max.z {
                continue;
            }
            canvas[cell.z.abs_diff(min.z) as usize][cell.x.abs_diff(min.x) as usize] =
                heading_glyph(vehicle.heading);
        }

        canvas.into_iter().map(|row| row.into_iter().collect()).collect()
    }
}

/// Arrow for a heading, with +z drawn downwards
fn heading_glyph(heading: f32) -> char {
    let forward = Position::from_heading(heading);
    if forward.x.abs() > forward.z.abs() {
        if forward.x > 0.0 {
            '>'
        } else {
            '<'
        }
    } else if forward.z >= 0.0 {
        'v'
    } else {
        '^'
    }
}
