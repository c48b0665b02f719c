//! Ambient traffic simulation
//!
//! Vehicles wander the road network one decision at a time, keep to the right
//! of the road, slow down behind whatever is in front of them, and disappear
//! when they run out of road. Nothing here depends on a renderer; the host
//! drives everything through `TrafficEngine::tick`.

mod archetype;
mod config;
mod engine;
mod movement;
mod planner;
mod road_graph;
mod spatial;
mod spawner;
mod stats;
mod types;
mod vehicle;

pub use archetype::{ArchetypeId, ArchetypeRegistry, VehicleArchetype};
pub use config::{
    TrafficConfig, DEFAULT_SPAWN_INTERVAL, EARLY_TURN_CHANCE, LATE_TURN_CHANCE,
    RECENT_HISTORY_LEN, SPAWN_COOLDOWN_MULTIPLIER, SPAWN_JITTER_MAX, SPAWN_JITTER_MIN,
    TURN_DOT_THRESHOLD,
};
pub use engine::{StopHandle, TrafficEngine};
pub use movement::{
    avoidance_speed, cornering_speed, sense_obstacle, steer_heading, Obstacle, ObstacleSample,
    TrafficSnapshot,
};
pub use planner::{
    avoid_recent, candidate_targets, plan_next_target, straightest_candidate, turn_chance,
    PlanOutcome,
};
pub use road_graph::{GridRoadNetwork, RoadGraph};
pub use spatial::SpatialGrid;
pub use spawner::{sample_speed, SpawnDecision, SpawnPlan, SpawnScheduler, SpawnSkip};
pub use stats::TrafficStats;
pub use types::{wrap_angle, GridPos, Position, SimId, VehicleId, GRID_DIRECTIONS};
pub use vehicle::{AgentState, AgentUpdateResult, DespawnReason, VehicleAgent};
