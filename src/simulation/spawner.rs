//! Spawn scheduling for new vehicles
//!
//! Every jittered interval the scheduler makes one attempt to place a vehicle
//! on a road node that has somewhere to go and has not been used recently.

use std::collections::HashMap;

use rand::seq::IndexedRandom;
use rand::Rng;

use super::archetype::{ArchetypeId, ArchetypeRegistry};
use super::config::{TrafficConfig, SPAWN_JITTER_MAX, SPAWN_JITTER_MIN};
use super::road_graph::RoadGraph;
use super::types::GridPos;

/// Everything needed to create a vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPlan {
    pub start: GridPos,
    pub target: GridPos,
    pub speed: f32,
    pub archetype: ArchetypeId,
}

/// Why a tick produced no vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnSkip {
    /// The spawn interval has not elapsed yet
    NotDue,
    /// Already at the vehicle cap
    AtCapacity,
    /// Fewer than two road nodes
    NetworkTooSmall,
    /// Every connected node is still cooling down
    NoEligibleNode,
    /// Nothing to instantiate
    NoArchetypes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpawnDecision {
    Spawn(SpawnPlan),
    Skip(SpawnSkip),
}

#[derive(Debug, Default)]
pub struct SpawnScheduler {
    /// Simulation time each node was last used as a spawn point
    last_spawn: HashMap<GridPos, f32>,
    /// Seconds until the next spawn attempt
    next_attempt_in: f32,
}

impl SpawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all cooldowns and wait a fresh interval before the first attempt
    pub fn reset<R: Rng + ?Sized>(&mut self, config: &TrafficConfig, rng: &mut R) {
        self.last_spawn.clear();
        self.next_attempt_in = Self::sample_interval(config, rng);
    }

    /// Forget all cooldowns
    pub fn clear(&mut self) {
        self.last_spawn.clear();
        self.next_attempt_in = 0.0;
    }

    /// Base interval scaled by a uniform jitter factor
    pub fn sample_interval<R: Rng + ?Sized>(config: &TrafficConfig, rng: &mut R) -> f32 {
        config.spawn_interval_base * rng.random_range(SPAWN_JITTER_MIN..=SPAWN_JITTER_MAX)
    }

    /// Advance the spawn timer and, when it fires, try to plan one spawn
    #[allow(clippy::too_many_arguments)]
    pub fn tick<G, R>(
        &mut self,
        delta_secs: f32,
        now: f32,
        active_count: usize,
        capacity: usize,
        graph: &G,
        archetypes: &ArchetypeRegistry,
        config: &TrafficConfig,
        rng: &mut R,
    ) -> SpawnDecision
    where
        G: RoadGraph + ?Sized,
        R: Rng + ?Sized,
    {
        self.next_attempt_in -= delta_secs;
        if self.next_attempt_in > 0.0 {
            return SpawnDecision::Skip(SpawnSkip::NotDue);
        }
        self.next_attempt_in = Self::sample_interval(config, rng);

        if active_count >= capacity {
            return SpawnDecision::Skip(SpawnSkip::AtCapacity);
        }

        self.plan_spawn(now, graph, archetypes, config, rng)
    }

    /// Pick a start node, first target, speed, and template, and claim the start node
    pub fn plan_spawn<G, R>(
        &mut self,
        now: f32,
        graph: &G,
        archetypes: &ArchetypeRegistry,
        config: &TrafficConfig,
        rng: &mut R,
    ) -> SpawnDecision
    where
        G: RoadGraph + ?Sized,
        R: Rng + ?Sized,
    {
        if graph.node_count() < 2 {
            return SpawnDecision::Skip(SpawnSkip::NetworkTooSmall);
        }

        let eligible = self.eligible_start_nodes(now, graph, config);
        let Some(&start) = eligible.choose(rng) else {
            return SpawnDecision::Skip(SpawnSkip::NoEligibleNode);
        };

        // Re-query: the node's neighbors are the authority on where we can go
        let Some(&target) = graph.neighbors(start).choose(rng) else {
            return SpawnDecision::Skip(SpawnSkip::NoEligibleNode);
        };

        let Some(archetype) = archetypes.pick(rng) else {
            return SpawnDecision::Skip(SpawnSkip::NoArchetypes);
        };

        self.record_spawn(start, now);

        SpawnDecision::Spawn(SpawnPlan {
            start,
            target,
            speed: sample_speed(config, rng),
            archetype,
        })
    }

    /// Road nodes with at least one neighbor whose cooldown has expired
    pub fn eligible_start_nodes<G: RoadGraph + ?Sized>(
        &self,
        now: f32,
        graph: &G,
        config: &TrafficConfig,
    ) -> Vec<GridPos> {
        let cooldown = config.spawn_cooldown();
        graph
            .all_road_nodes()
            .into_iter()
            .filter(|node| match self.last_spawn.get(node) {
                Some(last) => now - last > cooldown,
                None => true,
            })
            .filter(|node| !graph.neighbors(*node).is_empty())
            .collect()
    }

    pub fn record_spawn(&mut self, node: GridPos, now: f32) {
        self.last_spawn.insert(node, now);
    }

    pub fn last_spawn_at(&self, node: GridPos) -> Option<f32> {
        self.last_spawn.get(&node).copied()
    }

    pub fn cooldown_entries(&self) -> usize {
        self.last_spawn.len()
    }
}

/// Uniform cruising speed between the configured bounds
pub fn sample_speed<R: Rng + ?Sized>(config: &TrafficConfig, rng: &mut R) -> f32 {
    rng.random_range(config.min_speed..=config.max_speed)
}
