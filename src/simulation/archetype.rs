//! Vehicle templates the spawner picks from
//!
//! The engine never looks inside a template; it only records which one each
//! vehicle was spawned from so the host can render it.

use rand::Rng;

/// Index of a template in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleArchetype {
    pub name: String,
    /// Body length in world units
    pub length: f32,
}

impl VehicleArchetype {
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// The list of instantiable vehicle templates
#[derive(Debug, Clone, Default)]
pub struct ArchetypeRegistry {
    archetypes: Vec<VehicleArchetype>,
}

impl ArchetypeRegistry {
    pub fn new(archetypes: Vec<VehicleArchetype>) -> Self {
        Self { archetypes }
    }

    /// A handful of generic city cars
    pub fn with_defaults() -> Self {
        Self::new(vec![
            VehicleArchetype::new("sedan", 0.5),
            VehicleArchetype::new("hatchback", 0.4),
            VehicleArchetype::new("van", 0.6),
            VehicleArchetype::new("taxi", 0.5),
        ])
    }

    /// Pick a template uniformly at random
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<ArchetypeId> {
        if self.archetypes.is_empty() {
            return None;
        }
        Some(ArchetypeId(rng.random_range(0..self.archetypes.len())))
    }

    pub fn get(&self, id: ArchetypeId) -> Option<&VehicleArchetype> {
        self.archetypes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}
