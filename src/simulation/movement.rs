//! Local movement: obstacle sensing, speed policy, and steering
//!
//! Vehicles only see what is ahead of them in a per-tick snapshot of every
//! other vehicle. They slow down behind whatever they find, but always keep
//! creeping forward.

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use super::config::TrafficConfig;
use super::spatial::SpatialGrid;
use super::types::{wrap_angle, Position, VehicleId};
use super::vehicle::VehicleAgent;

/// What other vehicles can observe about a vehicle during one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleSample {
    pub position: Position,
    pub heading: f32,
    /// Sampled cruising speed
    pub speed: f32,
}

/// Frozen view of all vehicles, taken once per tick before any of them move
pub struct TrafficSnapshot {
    samples: HashMap<VehicleId, ObstacleSample>,
    grid: SpatialGrid,
}

impl TrafficSnapshot {
    pub fn new(config: &TrafficConfig) -> Self {
        Self {
            samples: HashMap::new(),
            grid: SpatialGrid::new(config.detection_distance),
        }
    }

    /// Capture the observable state of every vehicle
    pub fn capture<'a>(
        agents: impl IntoIterator<Item = &'a VehicleAgent>,
        config: &TrafficConfig,
    ) -> Self {
        let mut snapshot = Self::new(config);
        for agent in agents {
            snapshot.insert(
                agent.id,
                ObstacleSample {
                    position: agent.position,
                    heading: agent.heading,
                    speed: agent.speed,
                },
            );
        }
        snapshot
    }

    pub fn insert(&mut self, id: VehicleId, sample: ObstacleSample) {
        if self.samples.insert(id, sample).is_some() {
            // Re-inserting an id would leave it in its old bucket too
            self.grid.clear();
            for (id, sample) in &self.samples {
                self.grid.insert(*id, &sample.position);
            }
        } else {
            self.grid.insert(id, &sample.position);
        }
    }

    pub fn get(&self, id: VehicleId) -> Option<&ObstacleSample> {
        self.samples.get(&id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn nearby(&self, position: &Position, radius: f32) -> Vec<VehicleId> {
        self.grid.query_radius(position, radius)
    }
}

/// The closest vehicle found ahead
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub id: VehicleId,
    /// Distance ahead along our heading
    pub gap: f32,
    /// The obstacle's sampled speed
    pub speed: f32,
}

/// Sweep forward from `position` along `heading` for the nearest other vehicle
///
/// A vehicle counts as ahead when it lies in front of us, within the detection
/// distance, and no further than the sensing radius from our line of travel.
pub fn sense_obstacle(
    snapshot: &TrafficSnapshot,
    own_id: VehicleId,
    position: &Position,
    heading: f32,
    config: &TrafficConfig,
) -> Option<Obstacle> {
    let forward = Position::from_heading(heading);
    // Far corners of the sweep lie beyond the detection distance
    let reach = config.detection_distance.hypot(config.sensing_radius);

    snapshot
        .nearby(position, reach)
        .into_iter()
        .filter(|id| *id != own_id)
        .filter_map(|id| {
            let sample = snapshot.get(id)?;
            let offset = sample.position - *position;
            let along = offset.dot(&forward);
            if along <= 0.0 || along > config.detection_distance {
                return None;
            }
            let lateral = (offset - forward * along).length();
            if lateral > config.sensing_radius {
                return None;
            }
            Some(Obstacle {
                id,
                gap: along,
                speed: sample.speed,
            })
        })
        .min_by_key(|obstacle| (OrderedFloat(obstacle.gap), obstacle.id))
}

/// Speed to drive given what is ahead
///
/// Closer than the safe distance the vehicle hard-yields; further out it
/// matches the slower of the two speeds. The result never drops below the
/// creep floor, so a blocked vehicle still inches forward.
pub fn avoidance_speed(own_speed: f32, obstacle: Option<&Obstacle>, config: &TrafficConfig) -> f32 {
    let Some(obstacle) = obstacle else {
        return own_speed;
    };

    let speed = if obstacle.gap < config.safe_distance {
        (own_speed * config.hard_yield_factor).min(obstacle.speed * config.obstacle_yield_factor)
    } else {
        own_speed.min(obstacle.speed)
    };
    speed.max(creep_speed(own_speed, config))
}

/// Slow down while the heading is still swinging round towards the aim point
///
/// Without this a fast vehicle circles its aim point instead of reaching it.
pub fn cornering_speed(
    own_speed: f32,
    avoidance_speed: f32,
    heading: f32,
    desired_heading: f32,
    config: &TrafficConfig,
) -> f32 {
    let alignment = wrap_angle(desired_heading - heading)
        .cos()
        .max(config.min_creep_fraction);
    avoidance_speed
        .min(own_speed * alignment)
        .max(creep_speed(own_speed, config))
}

/// Turn `heading` part of the way towards `desired`, along the shorter arc
pub fn steer_heading(heading: f32, desired: f32, delta_secs: f32, config: &TrafficConfig) -> f32 {
    let t = (delta_secs * config.steering_rate).clamp(0.0, 1.0);
    wrap_angle(heading + wrap_angle(desired - heading) * t)
}

fn creep_speed(own_speed: f32, config: &TrafficConfig) -> f32 {
    own_speed * config.min_creep_fraction
}
