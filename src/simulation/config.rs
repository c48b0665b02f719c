//! Tunables for the traffic simulation
//!
//! The engine takes a `TrafficConfig` by value at construction; nothing is
//! reconfigured while a run is in progress.

use anyhow::{bail, Result};

/// Default base spawn interval in seconds
pub const DEFAULT_SPAWN_INTERVAL: f32 = 3.0;

/// Number of visited nodes treated as "recent" when avoiding loops
pub const RECENT_HISTORY_LEN: usize = 3;

/// Chance of a random turn while still inside the minimum straight time
pub const EARLY_TURN_CHANCE: f64 = 0.5;

/// Chance of a random turn once the minimum straight time has elapsed
pub const LATE_TURN_CHANCE: f64 = 0.7;

/// Direction changes with a dot product below this count as a turn
pub const TURN_DOT_THRESHOLD: f32 = 0.7;

/// Spawn interval jitter bounds
pub const SPAWN_JITTER_MIN: f32 = 0.8;
pub const SPAWN_JITTER_MAX: f32 = 1.2;

/// Cooldown before a spawn node may be reused, in multiples of the base interval
pub const SPAWN_COOLDOWN_MULTIPLIER: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficConfig {
    /// Base time between spawn attempts, in seconds
    pub spawn_interval_base: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Vehicles allowed per road node
    pub vehicles_per_road_ratio: f32,
    /// Hard cap on simultaneous vehicles regardless of road count
    pub absolute_max_vehicles: usize,
    /// Gap below which a vehicle hard-yields to the one ahead
    pub safe_distance: f32,
    /// How far ahead vehicles sense for obstacles
    pub detection_distance: f32,
    /// Lateral offset to the right of the travel direction
    pub lane_offset: f32,
    /// Heading interpolation rate per second
    pub steering_rate: f32,
    /// Minimum time to follow the current path before turns get more likely
    pub min_straight_path_time: f32,
    /// Consecutive ticks without meaningful displacement before despawning
    pub stuck_tick_threshold: u32,
    /// Distance to the aim point that counts as arriving
    pub arrival_radius: f32,
    /// World size of one grid cell
    pub cell_size: f32,
    /// Displacement below this counts as not moving
    pub stuck_epsilon: f32,
    /// Half-width of the forward sensing sweep
    pub sensing_radius: f32,
    /// Own-speed factor applied when closer than the safe distance
    pub hard_yield_factor: f32,
    /// Obstacle-speed factor applied when closer than the safe distance
    pub obstacle_yield_factor: f32,
    /// Floor of the effective speed as a fraction of the sampled speed
    pub min_creep_fraction: f32,
    /// Optional seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            spawn_interval_base: DEFAULT_SPAWN_INTERVAL,
            min_speed: 3.0,
            max_speed: 7.0,
            vehicles_per_road_ratio: 0.5,
            absolute_max_vehicles: 50,
            safe_distance: 2.5,
            detection_distance: 5.0,
            lane_offset: 0.4,
            steering_rate: 2.0,
            min_straight_path_time: 5.0,
            stuck_tick_threshold: 100,
            arrival_radius: 0.5,
            cell_size: 1.0,
            stuck_epsilon: 0.01,
            sensing_radius: 0.5,
            hard_yield_factor: 0.5,
            obstacle_yield_factor: 0.8,
            min_creep_fraction: 0.1,
            seed: None,
        }
    }
}

impl TrafficConfig {
    /// Create a config with a fixed RNG seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Spawn-node cooldown in seconds
    pub fn spawn_cooldown(&self) -> f32 {
        self.spawn_interval_base * SPAWN_COOLDOWN_MULTIPLIER
    }

    /// Maximum simultaneous vehicles for a road network of the given size
    ///
    /// At least one vehicle is allowed on any non-empty network, but the
    /// absolute cap always wins, so a cap of zero disables spawning.
    pub fn capacity(&self, road_node_count: usize) -> usize {
        let scaled = (road_node_count as f32 * self.vehicles_per_road_ratio).round_ties_even();
        let scaled = if scaled.is_finite() && scaled > 0.0 {
            scaled as usize
        } else {
            0
        };
        let floor = usize::from(road_node_count > 0);
        scaled.max(floor).min(self.absolute_max_vehicles)
    }

    /// Check that every tunable is usable
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("spawn_interval_base", self.spawn_interval_base),
            ("vehicles_per_road_ratio", self.vehicles_per_road_ratio),
            ("safe_distance", self.safe_distance),
            ("lane_offset", self.lane_offset),
            ("steering_rate", self.steering_rate),
            ("min_straight_path_time", self.min_straight_path_time),
            ("stuck_epsilon", self.stuck_epsilon),
            ("sensing_radius", self.sensing_radius),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a finite non-negative number, got {value}");
            }
        }

        let positive = [
            ("min_speed", self.min_speed),
            ("max_speed", self.max_speed),
            ("detection_distance", self.detection_distance),
            ("arrival_radius", self.arrival_radius),
            ("cell_size", self.cell_size),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                bail!("{name} must be a finite positive number, got {value}");
            }
        }

        if self.min_speed > self.max_speed {
            bail!(
                "min_speed ({}) must not exceed max_speed ({})",
                self.min_speed,
                self.max_speed
            );
        }

        let fractions = [
            ("hard_yield_factor", self.hard_yield_factor),
            ("obstacle_yield_factor", self.obstacle_yield_factor),
            ("min_creep_fraction", self.min_creep_fraction),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                bail!("{name} must be in (0, 1], got {value}");
            }
        }

        Ok(())
    }
}
