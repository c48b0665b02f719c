//! Bucketed spatial index for vehicle proximity queries

use std::collections::HashMap;

use super::types::{Position, VehicleId};

pub struct SpatialGrid {
    bucket_size: f32,
    buckets: HashMap<(i32, i32), Vec<VehicleId>>,
}

impl SpatialGrid {
    /// Create an empty grid. Buckets should be about as large as the typical query radius.
    pub fn new(bucket_size: f32) -> Self {
        Self {
            bucket_size: bucket_size.max(f32::EPSILON),
            buckets: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn insert(&mut self, id: VehicleId, position: &Position) {
        let key = self.bucket_of(position.x, position.z);
        self.buckets.entry(key).or_default().push(id);
    }

    /// Ids in every bucket touched by the square around `center`
    ///
    /// Callers filter by exact distance; this only narrows the candidates.
    pub fn query_radius(&self, center: &Position, radius: f32) -> Vec<VehicleId> {
        let (min_bx, min_bz) = self.bucket_of(center.x - radius, center.z - radius);
        let (max_bx, max_bz) = self.bucket_of(center.x + radius, center.z + radius);

        let mut result = Vec::new();
        for bz in min_bz..=max_bz {
            for bx in min_bx..=max_bx {
                if let Some(bucket) = self.buckets.get(&(bx, bz)) {
                    result.extend_from_slice(bucket);
                }
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn bucket_of(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.bucket_size).floor() as i32,
            (z / self.bucket_size).floor() as i32,
        )
    }
}
