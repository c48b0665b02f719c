//! Next-target selection at decision points
//!
//! Vehicles do not plan whole routes. Each time one reaches its target node it
//! picks the next node from the road cells around it: never straight back the
//! way it came, avoiding the last few nodes when it can, and otherwise either
//! turning at random or carrying on as straight as the road allows.

use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::config::{
    TrafficConfig, EARLY_TURN_CHANCE, LATE_TURN_CHANCE, RECENT_HISTORY_LEN, TURN_DOT_THRESHOLD,
};
use super::road_graph::RoadGraph;
use super::types::{GridPos, Position};
use super::vehicle::{DespawnReason, VehicleAgent};

/// What a vehicle should do after reaching its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    NewTarget(GridPos),
    Despawn(DespawnReason),
}

/// Handle a vehicle arriving at its target node
///
/// On success the vehicle has moved onto its old target and holds a new one.
pub fn plan_next_target<G, R>(
    agent: &mut VehicleAgent,
    graph: &G,
    config: &TrafficConfig,
    rng: &mut R,
) -> PlanOutcome
where
    G: RoadGraph + ?Sized,
    R: Rng + ?Sized,
{
    // The road we were driving to may have been bulldozed since we picked it
    if !graph.is_road(agent.target_node) {
        return PlanOutcome::Despawn(DespawnReason::TargetInvalidated);
    }

    agent.arrive_at_target();
    let current = agent.current_node;
    let previous = agent.previous_node;

    let mut candidates = candidate_targets(graph, current, previous);
    if candidates.is_empty() {
        return PlanOutcome::Despawn(DespawnReason::DeadEnd);
    }

    if agent.visit_count() > RECENT_HISTORY_LEN && candidates.len() > 1 {
        let recent: Vec<GridPos> = agent.recent_nodes().copied().collect();
        candidates = avoid_recent(candidates, &recent);
    }

    let chance = turn_chance(agent.path_follow_time, config);
    let chosen = if candidates.len() > 1 && rng.random_bool(chance) {
        candidates.choose(rng).copied()
    } else {
        straightest_candidate(current, previous, &candidates)
    };

    let Some(next) = chosen else {
        return PlanOutcome::Despawn(DespawnReason::DeadEnd);
    };

    if !graph.is_road(next) {
        return PlanOutcome::Despawn(DespawnReason::TargetInvalidated);
    }

    let old_direction = direction(previous, current);
    let new_direction = direction(current, next);
    if old_direction.dot(&new_direction) < TURN_DOT_THRESHOLD {
        agent.path_follow_time = 0.0;
    }

    agent.target_node = next;
    PlanOutcome::NewTarget(next)
}

/// Road neighbors of `current`, minus the node we just came from
pub fn candidate_targets<G: RoadGraph + ?Sized>(
    graph: &G,
    current: GridPos,
    previous: GridPos,
) -> Vec<GridPos> {
    let mut candidates = graph.neighbors(current);
    candidates.retain(|node| *node != previous);
    candidates
}

/// Drop recently visited nodes, unless that would leave nothing to choose from
pub fn avoid_recent(candidates: Vec<GridPos>, recent: &[GridPos]) -> Vec<GridPos> {
    let fresh: Vec<GridPos> = candidates
        .iter()
        .copied()
        .filter(|node| !recent.contains(node))
        .collect();

    if fresh.is_empty() {
        candidates
    } else {
        fresh
    }
}

/// Probability of picking a random candidate instead of going straight
pub fn turn_chance(path_follow_time: f32, config: &TrafficConfig) -> f64 {
    if path_follow_time < config.min_straight_path_time {
        EARLY_TURN_CHANCE
    } else {
        LATE_TURN_CHANCE
    }
}

/// The candidate best aligned with the direction of travel into `current`
///
/// Ties go to the earliest candidate.
pub fn straightest_candidate(
    current: GridPos,
    previous: GridPos,
    candidates: &[GridPos],
) -> Option<GridPos> {
    let forward = direction(previous, current);
    candidates
        .iter()
        .copied()
        .enumerate()
        .max_by_key(|(index, node)| {
            (
                OrderedFloat(forward.dot(&direction(current, *node))),
                std::cmp::Reverse(*index),
            )
        })
        .map(|(_, node)| node)
}

fn direction(from: GridPos, to: GridPos) -> Position {
    from.to_world(1.0).direction_to(&to.to_world(1.0))
}
