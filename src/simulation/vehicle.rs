//! Vehicle agent state and its per-tick update
//!
//! Each vehicle is a resumable record: the engine calls `update` once per tick
//! and the vehicle either keeps driving or reports why it should be despawned.

use std::collections::VecDeque;

use log::{trace, warn};
use rand::Rng;

use super::archetype::ArchetypeId;
use super::config::{TrafficConfig, RECENT_HISTORY_LEN};
use super::movement::{self, TrafficSnapshot};
use super::planner::{self, PlanOutcome};
use super::road_graph::RoadGraph;
use super::types::{GridPos, Position, VehicleId};

/// Why a vehicle left the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DespawnReason {
    /// No next node other than the one it came from
    DeadEnd,
    /// The node it was heading for stopped being a road
    TargetInvalidated,
    /// No meaningful movement for too many ticks
    Stuck,
    /// The engine was stopped
    Stopped,
}

/// Lifecycle of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Spawned,
    Traveling,
    Despawned(DespawnReason),
}

/// Result of a vehicle update indicating what action should be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentUpdateResult {
    Continue,
    Despawn(DespawnReason),
}

/// A vehicle in the traffic simulation
#[derive(Debug, Clone)]
pub struct VehicleAgent {
    pub id: VehicleId,
    pub archetype: ArchetypeId,
    pub state: AgentState,
    /// Node the vehicle most recently reached (or spawned at)
    pub current_node: GridPos,
    /// Node the vehicle came from before `current_node`
    pub previous_node: GridPos,
    /// Neighbor of `current_node` the vehicle is driving towards
    pub target_node: GridPos,
    /// Last few nodes the vehicle drove through before `current_node`
    history: VecDeque<GridPos>,
    /// Total nodes visited, including the spawn node
    visit_count: usize,
    /// Cruising speed sampled at spawn
    pub speed: f32,
    /// Speed actually driven during the last update
    pub effective_speed: f32,
    /// Seconds since the last real change of direction
    pub path_follow_time: f32,
    /// Y-axis rotation in radians
    pub heading: f32,
    pub position: Position,
    stuck_ticks: u32,
    stuck_anchor: Position,
}

impl VehicleAgent {
    /// Place a new vehicle at `start`, in the lane facing `target`
    pub fn new(
        id: VehicleId,
        archetype: ArchetypeId,
        start: GridPos,
        target: GridPos,
        speed: f32,
        config: &TrafficConfig,
    ) -> Self {
        let start_world = start.to_world(config.cell_size);
        let direction = start_world.direction_to(&target.to_world(config.cell_size));
        let position = start_world + direction.right_perpendicular() * config.lane_offset;

        let mut agent = Self {
            id,
            archetype,
            state: AgentState::Spawned,
            current_node: start,
            previous_node: start,
            target_node: target,
            history: VecDeque::with_capacity(RECENT_HISTORY_LEN),
            visit_count: 1,
            speed,
            effective_speed: speed,
            path_follow_time: 0.0,
            heading: 0.0,
            position,
            stuck_ticks: 0,
            stuck_anchor: position,
        };
        agent.heading = position.angle_to(&agent.aim_point(config));
        agent
    }

    /// Unit direction from the current node towards the target node
    pub fn travel_direction(&self) -> Position {
        let from = self.current_node.to_world(1.0);
        from.direction_to(&self.target_node.to_world(1.0))
    }

    /// The target node shifted into the right-hand lane
    pub fn aim_point(&self, config: &TrafficConfig) -> Position {
        self.target_node.to_world(config.cell_size)
            + self.travel_direction().right_perpendicular() * config.lane_offset
    }

    /// Nodes driven through just before the current one, oldest first
    pub fn recent_nodes(&self) -> impl Iterator<Item = &GridPos> {
        self.history.iter()
    }

    pub fn visit_count(&self) -> usize {
        self.visit_count
    }

    pub fn stuck_ticks(&self) -> u32 {
        self.stuck_ticks
    }

    /// Move onto the target node, remembering where we came from
    pub(super) fn arrive_at_target(&mut self) {
        if self.history.len() == RECENT_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(self.current_node);
        self.visit_count += 1;

        self.previous_node = self.current_node;
        self.current_node = self.target_node;
    }

    /// Advance this vehicle by one tick
    pub fn update<G, R>(
        &mut self,
        delta_secs: f32,
        graph: &G,
        snapshot: &TrafficSnapshot,
        config: &TrafficConfig,
        rng: &mut R,
    ) -> AgentUpdateResult
    where
        G: RoadGraph + ?Sized,
        R: Rng + ?Sized,
    {
        if self.state == AgentState::Spawned {
            self.state = AgentState::Traveling;
        }

        // Displacement since the last update
        if self.position.distance(&self.stuck_anchor) < config.stuck_epsilon {
            self.stuck_ticks += 1;
            if self.stuck_ticks > config.stuck_tick_threshold {
                warn!(
                    "Vehicle {:?} made no progress for {} ticks near {:?}, despawning",
                    self.id, self.stuck_ticks, self.current_node
                );
                return self.despawn(DespawnReason::Stuck);
            }
        } else {
            self.stuck_ticks = 0;
            self.stuck_anchor = self.position;
        }

        let obstacle = movement::sense_obstacle(snapshot, self.id, &self.position, self.heading, config);
        let avoidance_speed = movement::avoidance_speed(self.speed, obstacle.as_ref(), config);

        if self.position.distance(&self.aim_point(config)) < config.arrival_radius {
            match planner::plan_next_target(self, graph, config, rng) {
                PlanOutcome::NewTarget(next) => {
                    trace!(
                        "Vehicle {:?} at {:?} heading for {:?}",
                        self.id,
                        self.current_node,
                        next
                    );
                }
                PlanOutcome::Despawn(reason) => {
                    return self.despawn(reason);
                }
            }
        }

        let aim = self.aim_point(config);
        let desired_heading = self.position.angle_to(&aim);
        self.heading = movement::steer_heading(self.heading, desired_heading, delta_secs, config);
        self.effective_speed = movement::cornering_speed(
            self.speed,
            avoidance_speed,
            self.heading,
            desired_heading,
            config,
        );

        self.position =
            self.position + Position::from_heading(self.heading) * (self.effective_speed * delta_secs);
        self.path_follow_time += delta_secs;

        AgentUpdateResult::Continue
    }

    fn despawn(&mut self, reason: DespawnReason) -> AgentUpdateResult {
        self.state = AgentState::Despawned(reason);
        AgentUpdateResult::Despawn(reason)
    }
}
