//! # Camera Raytrace
//!
//! Fixed-step line sampling through world cells.
//!
//! Unlike a DDA voxel walk this samples at a fixed spacing, which is all the
//! camera needs and keeps the sample count bounded by `distance / step`,
//! never more than [`MAX_RAY_SAMPLES`].

use vantage_shared::{Vec3, MAX_RAY_SAMPLES};

use crate::world::RegionCells;

/// A ray from `origin` along a unit `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Raytrace {
    origin: Vec3,
    direction: Vec3,
}

impl Raytrace {
    /// Creates a ray. `direction` is expected to be normalized.
    #[must_use]
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at `distance` along the ray.
    #[must_use]
    pub fn point_at(&self, distance: f64) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Sample points from `0` to `distance` inclusive, `step` apart.
    ///
    /// A non-positive or non-finite `step` yields the origin only. At most
    /// [`MAX_RAY_SAMPLES`] points are produced.
    pub fn traverse(&self, distance: f64, step: f64) -> impl Iterator<Item = Vec3> + '_ {
        let count = sample_count(distance, step);
        (0..count).map(move |i| {
            #[allow(clippy::cast_precision_loss)]
            let travelled = i as f64 * step;
            self.point_at(travelled)
        })
    }

    /// Last clear sample before the first blocking one.
    ///
    /// `None` when the very first sample is already blocking.
    #[must_use]
    pub fn most_distant_clear_point(
        &self,
        distance: f64,
        step: f64,
        world: &RegionCells<'_>,
    ) -> Option<Vec3> {
        let mut clear = None;
        for point in self.traverse(distance, step) {
            if !world.is_passable(point) {
                break;
            }
            clear = Some(point);
        }
        clear
    }

    /// True iff EVERY sample is blocking.
    ///
    /// NOTE: reads like "anything in the way" but is a strict conjunction.
    /// The birds-eye fallback relies on exactly this, keep it.
    #[must_use]
    pub fn has_obstruction(&self, distance: f64, step: f64, world: &RegionCells<'_>) -> bool {
        self.traverse(distance, step)
            .all(|point| !world.is_passable(point))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn sample_count(distance: f64, step: f64) -> usize {
    if !(step.is_finite() && step > 0.0) || !distance.is_finite() || distance < 0.0 {
        return 1;
    }
    // Small epsilon so 4.0 / 0.5 style ratios land on the inclusive end.
    let intervals = (distance / step + 1e-9).floor();
    if !intervals.is_finite() || intervals >= MAX_RAY_SAMPLES as f64 {
        return MAX_RAY_SAMPLES;
    }
    (intervals as usize).saturating_add(1).min(MAX_RAY_SAMPLES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CellKind, VoxelGrid};
    use vantage_shared::RegionId;

    const REGION: RegionId = RegionId(0);

    fn up_from(origin: Vec3) -> Raytrace {
        Raytrace::new(origin, Vec3::UP)
    }

    #[test]
    fn test_traverse_is_inclusive_and_bounded() {
        let ray = up_from(Vec3::ZERO);
        let points: Vec<_> = ray.traverse(4.0, 0.5).collect();
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], Vec3::ZERO);
        assert_eq!(points[8], Vec3::new(0.0, 4.0, 0.0));
    }

    #[test]
    fn test_traverse_is_deterministic() {
        let dir = Vec3::new(1.0, -2.0, 0.5).normalized().unwrap();
        let ray = Raytrace::new(Vec3::new(10.3, 64.0, -7.7), dir);
        let a: Vec<_> = ray.traverse(4.0, 0.5).collect();
        let b: Vec<_> = ray.traverse(4.0, 0.5).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_step() {
        let ray = up_from(Vec3::ZERO);
        assert_eq!(ray.traverse(4.0, 0.0).count(), 1);
        assert_eq!(ray.traverse(4.0, f64::NAN).count(), 1);
        assert_eq!(ray.traverse(0.0, 0.5).count(), 1);
    }

    #[test]
    fn test_huge_ratio_is_capped() {
        let ray = up_from(Vec3::ZERO);
        assert_eq!(ray.traverse(1e30, 0.5).count(), MAX_RAY_SAMPLES);
        assert_eq!(ray.traverse(1e6, 1e-3).count(), MAX_RAY_SAMPLES);
        assert_eq!(ray.traverse(4.0, f64::MIN_POSITIVE).count(), MAX_RAY_SAMPLES);
    }

    #[test]
    fn test_most_distant_clear_point_stops_at_first_block() {
        let mut grid = VoxelGrid::new();
        // Ceiling two cells above the origin cell.
        grid.set(REGION, [0, 2, 0], CellKind::Stone);
        let world = RegionCells::new(&grid, REGION);

        let ray = up_from(Vec3::new(0.5, 0.5, 0.5));
        let point = ray.most_distant_clear_point(4.0, 0.5, &world).unwrap();
        assert_eq!(point, Vec3::new(0.5, 1.5, 0.5));
    }

    #[test]
    fn test_most_distant_clear_point_ignores_cells_past_a_block() {
        let mut grid = VoxelGrid::new();
        grid.set(REGION, [0, 1, 0], CellKind::Stone);
        // Open again above the block: must not be reached.
        let world = RegionCells::new(&grid, REGION);

        let ray = up_from(Vec3::new(0.5, 0.0, 0.5));
        let point = ray.most_distant_clear_point(4.0, 0.5, &world).unwrap();
        assert_eq!(point, Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_most_distant_clear_point_none_when_origin_blocked() {
        let grid = VoxelGrid::with_ground(10);
        let world = RegionCells::new(&grid, REGION);
        let ray = up_from(Vec3::new(0.5, 0.5, 0.5));
        assert!(ray.most_distant_clear_point(4.0, 0.5, &world).is_none());
    }

    #[test]
    fn test_passable_flora_and_liquids_do_not_stop_the_ray() {
        let mut grid = VoxelGrid::new();
        grid.set(REGION, [0, 1, 0], CellKind::Water);
        grid.set(REGION, [0, 2, 0], CellKind::TallGrass);
        let world = RegionCells::new(&grid, REGION);
        let ray = up_from(Vec3::new(0.5, 0.0, 0.5));
        let point = ray.most_distant_clear_point(4.0, 0.5, &world).unwrap();
        assert_eq!(point, Vec3::new(0.5, 4.0, 0.5));
    }

    #[test]
    fn test_has_obstruction_is_a_conjunction() {
        let region = REGION;
        let mut grid = VoxelGrid::new();
        grid.fill(region, [0, 0, 0], [0, 3, 0], CellKind::Stone);
        let world = RegionCells::new(&grid, region);
        let ray = up_from(Vec3::new(0.5, 0.0, 0.5));

        // Top sample (y = 4.0) is still open: not "obstructed".
        assert!(!ray.has_obstruction(4.0, 0.5, &world));

        grid.set(region, [0, 4, 0], CellKind::Stone);
        let world = RegionCells::new(&grid, region);
        assert!(ray.has_obstruction(4.0, 0.5, &world));
    }
}
