//! Core types for the traffic simulation
//!
//! Grid positions for road nodes, world positions for vehicles, and ids.

use std::ops::{Add, Mul, Sub};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
///
/// Ids are handed out in increasing order, so sorting by id is spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub SimId);

/// A road node position on the integer grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub z: i32,
}

/// The four grid directions a road cell can connect through, in lookup order
pub const GRID_DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

impl GridPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The cell `dx`, `dz` away, or `None` past the edge of the grid
    pub fn offset(&self, dx: i32, dz: i32) -> Option<GridPos> {
        Some(GridPos::new(self.x.checked_add(dx)?, self.z.checked_add(dz)?))
    }

    /// The cells sharing an edge with this one, in `GRID_DIRECTIONS` order
    pub fn adjacent(self) -> impl Iterator<Item = GridPos> {
        GRID_DIRECTIONS
            .into_iter()
            .filter_map(move |(dx, dz)| self.offset(dx, dz))
    }

    /// World-space center of this cell
    pub fn to_world(&self, cell_size: f32) -> Position {
        Position::new(self.x as f32 * cell_size, 0.0, self.z as f32 * cell_size)
    }

    /// Cell containing a world position (rounded to the nearest cell center)
    pub fn from_world(position: &Position, cell_size: f32) -> GridPos {
        GridPos::new(
            (position.x / cell_size).round() as i32,
            (position.z / cell_size).round() as i32,
        )
    }
}

/// A 3D position in the simulation
///
/// Vehicles drive on the ground plane, so most helpers ignore `y`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ZERO: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (*other - *self).length()
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn dot(&self, other: &Position) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Unit vector in the same direction, or zero for a zero-length vector
    pub fn normalized(&self) -> Position {
        let len = self.length();
        if len > 0.0 {
            *self * (1.0 / len)
        } else {
            Position::ZERO
        }
    }

    /// Unit direction from this position to another
    pub fn direction_to(&self, other: &Position) -> Position {
        (*other - *self).normalized()
    }

    /// Calculate the angle from this position to another (Y-axis rotation)
    pub fn angle_to(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        if dx == 0.0 && dz == 0.0 {
            0.0
        } else {
            dx.atan2(dz)
        }
    }

    /// Right-hand perpendicular of a ground-plane direction
    pub fn right_perpendicular(&self) -> Position {
        Position::new(self.z, 0.0, -self.x)
    }

    /// Unit forward vector for a Y-axis rotation
    pub fn from_heading(heading: f32) -> Position {
        Position::new(heading.sin(), 0.0, heading.cos())
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Wrap an angle into [-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}
