//! # Entity Directory
//!
//! What the core is allowed to know about simulated entities.
//!
//! Hosts expose their entities through [`EntityDirectory`]. The core reads
//! snapshots, and the only write it ever performs is forcing a spectator's
//! mode to [`EntityMode::Observing`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vantage_shared::{EntityId, Orientation, RegionId, Transform, Vec3, DEFAULT_EYE_HEIGHT};

/// Game-mode-like state of an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityMode {
    /// Regular play.
    #[default]
    Survival,
    /// Free building.
    Creative,
    /// Restricted interaction.
    Adventure,
    /// Disembodied camera; cannot be watched.
    Observing,
}

impl EntityMode {
    /// Whether an entity in this mode may be spectated.
    #[must_use]
    pub const fn is_eligible(self) -> bool {
        !matches!(self, Self::Observing)
    }
}

/// Read-only view of an entity at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySnapshot {
    /// Stable identity.
    pub id: EntityId,
    /// Display name, unique among active entities.
    pub name: String,
    /// Region the entity lives in.
    pub region: RegionId,
    /// Feet position.
    pub position: Vec3,
    /// Look orientation.
    pub orientation: Orientation,
    /// Eye height above the feet.
    pub eye_height: f64,
    /// Current mode.
    pub mode: EntityMode,
}

impl EntitySnapshot {
    /// Eye transform: feet lifted by the eye height, same orientation.
    #[must_use]
    pub fn eye(&self) -> Transform {
        Transform::new(self.position.offset_y(self.eye_height), self.orientation)
    }

    /// Feet transform.
    #[must_use]
    pub fn body(&self) -> Transform {
        Transform::new(self.position, self.orientation)
    }

    /// Pose compared by the refresh skip path.
    #[must_use]
    pub fn pose(&self) -> SubjectPose {
        SubjectPose {
            region: self.region,
            eye: self.eye(),
        }
    }
}

/// Region plus eye transform of a subject.
///
/// Compared by exact equality: any change, however small, counts as movement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubjectPose {
    /// Region of the subject.
    pub region: RegionId,
    /// Eye transform of the subject.
    pub eye: Transform,
}

/// Host-side access to entities.
pub trait EntityDirectory {
    /// Current snapshot, `None` when the entity is not active.
    fn snapshot(&self, id: EntityId) -> Option<EntitySnapshot>;

    /// Forces an entity into a mode.
    fn set_mode(&mut self, id: EntityId, mode: EntityMode);

    /// Every active entity, in a stable order.
    fn active_entities(&self) -> Vec<EntityId>;

    /// Exact, case-sensitive name lookup.
    fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.active_entities().into_iter().find(|id| {
            self.snapshot(*id)
                .is_some_and(|snapshot| snapshot.name == name)
        })
    }
}

// ============================================================================
// ENTITY TABLE (in-memory directory)
// ============================================================================

/// In-memory [`EntityDirectory`] keyed by id.
#[derive(Clone, Debug, Default)]
pub struct EntityTable {
    entities: BTreeMap<EntityId, EntitySnapshot>,
    next_id: u64,
}

impl EntityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Adds a standing entity with the default eye height.
    pub fn spawn(&mut self, name: &str, region: RegionId, position: Vec3) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(
            id,
            EntitySnapshot {
                id,
                name: name.to_string(),
                region,
                position,
                orientation: Orientation::default(),
                eye_height: DEFAULT_EYE_HEIGHT,
                mode: EntityMode::Survival,
            },
        );
        id
    }

    /// Removes an entity.
    pub fn despawn(&mut self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.remove(&id)
    }

    /// Moves an entity within its region. Returns `false` if unknown.
    pub fn move_to(&mut self, id: EntityId, position: Vec3, orientation: Orientation) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.position = position;
                entity.orientation = orientation;
                true
            }
            None => false,
        }
    }

    /// Moves an entity into another region. Returns `false` if unknown.
    pub fn change_region(&mut self, id: EntityId, region: RegionId, position: Vec3) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.region = region;
                entity.position = position;
                true
            }
            None => false,
        }
    }

    /// Borrowed view of an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.get(&id)
    }

    /// Number of active entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when no entity is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityDirectory for EntityTable {
    fn snapshot(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.get(&id).cloned()
    }

    fn set_mode(&mut self, id: EntityId, mode: EntityMode) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.mode = mode;
        }
    }

    fn active_entities(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities
            .values()
            .find(|entity| entity.name == name)
            .map(|entity| entity.id)
    }
}
