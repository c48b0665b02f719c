//! Running totals for a traffic simulation

use std::collections::HashMap;

use super::spawner::SpawnSkip;
use super::vehicle::DespawnReason;

#[derive(Debug, Clone, Default)]
pub struct TrafficStats {
    pub total_spawned: usize,
    pub ticks: u64,
    pub elapsed_time: f32,
    despawns: HashMap<DespawnReason, usize>,
    skips: HashMap<SpawnSkip, usize>,
}

impl TrafficStats {
    pub fn record_despawn(&mut self, reason: DespawnReason) {
        *self.despawns.entry(reason).or_default() += 1;
    }

    pub fn record_skip(&mut self, reason: SpawnSkip) {
        *self.skips.entry(reason).or_default() += 1;
    }

    pub fn despawned(&self, reason: DespawnReason) -> usize {
        self.despawns.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_despawned(&self) -> usize {
        self.despawns.values().sum()
    }

    pub fn skipped(&self, reason: SpawnSkip) -> usize {
        self.skips.get(&reason).copied().unwrap_or(0)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "Spawned: {} | Dead ends: {} | Invalidated: {} | Stuck: {} | Stopped: {} | Time: {:.1}s",
            self.total_spawned,
            self.despawned(DespawnReason::DeadEnd),
            self.despawned(DespawnReason::TargetInvalidated),
            self.despawned(DespawnReason::Stuck),
            self.despawned(DespawnReason::Stopped),
            self.elapsed_time
        )
    }
}
