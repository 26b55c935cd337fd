//! # World Cells
//!
//! Cell classification for camera rays.
//!
//! The core never owns world data. Hosts implement [`CellClassifier`] over
//! their own storage; [`VoxelGrid`] is a sparse in-memory implementation for
//! tests, benches and the demo host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vantage_shared::{RegionId, Vec3};

/// Kind of a world cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Open air.
    #[default]
    Air,
    /// Air generated inside caves.
    CaveAir,
    /// Air outside the buildable range.
    VoidAir,
    /// Still or flowing water.
    Water,
    /// Short grass.
    Grass,
    /// Two-cell grass.
    TallGrass,
    /// Fern.
    Fern,
    /// Two-cell fern.
    LargeFern,
    /// Underwater grass.
    Seagrass,
    /// Two-cell underwater grass.
    TallSeagrass,
    /// Kelp stem.
    KelpPlant,
    /// Sugar cane.
    SugarCane,
    /// Sunflower.
    Sunflower,
    /// Peony.
    Peony,
    /// Lilac.
    Lilac,
    /// Rose bush.
    RoseBush,
    /// Stone.
    Stone,
    /// Dirt.
    Dirt,
    /// Glass. Transparent to light, still blocks the camera.
    Glass,
    /// Leaves.
    Leaves,
    /// Lava. A liquid, but not one the camera may sit in.
    Lava,
    /// Anything else, tagged with the host's own block id.
    Other(u16),
}

/// Camera classification of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Passability {
    /// A camera may occupy this cell.
    Passable,
    /// A camera placed here would clip.
    Blocking,
}

impl CellKind {
    /// Classifies this kind against the fixed passable allow-list.
    #[must_use]
    pub const fn passability(self) -> Passability {
        match self {
            Self::Air
            | Self::CaveAir
            | Self::VoidAir
            | Self::Water
            | Self::Grass
            | Self::TallGrass
            | Self::Fern
            | Self::LargeFern
            | Self::Seagrass
            | Self::TallSeagrass
            | Self::KelpPlant
            | Self::SugarCane
            | Self::Sunflower
            | Self::Peony
            | Self::Lilac
            | Self::RoseBush => Passability::Passable,
            Self::Stone | Self::Dirt | Self::Glass | Self::Leaves | Self::Lava | Self::Other(_) => {
                Passability::Blocking
            }
        }
    }

    /// Shorthand for `passability() == Passable`.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(self.passability(), Passability::Passable)
    }
}

/// Read access to world cells, implemented by the host.
pub trait CellClassifier {
    /// Kind of the cell at integer coordinates in a region.
    fn cell_kind(&self, region: RegionId, cell: [i32; 3]) -> CellKind;

    /// Classifies the cell containing `point`.
    fn classify(&self, region: RegionId, point: Vec3) -> Passability {
        self.cell_kind(region, point.cell()).passability()
    }
}

/// A classifier bound to one region, the world view a ray walks through.
#[derive(Clone, Copy)]
pub struct RegionCells<'a> {
    cells: &'a dyn CellClassifier,
    region: RegionId,
}

impl<'a> RegionCells<'a> {
    /// Binds `cells` to `region`.
    #[must_use]
    pub fn new(cells: &'a dyn CellClassifier, region: RegionId) -> Self {
        Self { cells, region }
    }

    /// Whether a camera may sit at `point`.
    #[must_use]
    pub fn is_passable(&self, point: Vec3) -> bool {
        self.cells.classify(self.region, point) == Passability::Passable
    }
}

// ============================================================================
// VOXEL GRID (in-memory world)
// ============================================================================

/// Sparse voxel storage with an optional flat stone floor.
#[derive(Clone, Debug, Default)]
pub struct VoxelGrid {
    cells: HashMap<(RegionId, [i32; 3]), CellKind>,
    ground_level: Option<i32>,
}

impl VoxelGrid {
    /// Creates an empty world made of air.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a world where every cell with `y < ground_level` is stone.
    #[must_use]
    pub fn with_ground(ground_level: i32) -> Self {
        Self {
            cells: HashMap::new(),
            ground_level: Some(ground_level),
        }
    }

    /// Sets a single cell.
    pub fn set(&mut self, region: RegionId, cell: [i32; 3], kind: CellKind) {
        self.cells.insert((region, cell), kind);
    }

    /// Fills the inclusive box `min..=max`.
    pub fn fill(&mut self, region: RegionId, min: [i32; 3], max: [i32; 3], kind: CellKind) {
        for y in min[1]..=max[1] {
            for z in min[2]..=max[2] {
                for x in min[0]..=max[0] {
                    self.set(region, [x, y, z], kind);
                }
            }
        }
    }

    /// Number of explicitly stored cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if no cell was set explicitly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl CellClassifier for VoxelGrid {
    fn cell_kind(&self, region: RegionId, cell: [i32; 3]) -> CellKind {
        if let Some(kind) = self.cells.get(&(region, cell)) {
            return *kind;
        }
        match self.ground_level {
            Some(level) if cell[1] < level => CellKind::Stone,
            _ => CellKind::Air,
        }
    }
}
