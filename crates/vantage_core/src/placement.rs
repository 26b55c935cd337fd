//! # Camera Placement
//!
//! Picks the proxy transform for a subject's eye pose.
//!
//! ```text
//!   backward ray clear? ──yes──> pitch steep? ──no──> third-person shot
//!          │                          └─yes─> just below the eye
//!          no
//!          └──> upward ray fully blocked? ──yes──> just above the eye
//!                                   └─no──> birds-eye, looking down
//!
//!   every shot is finally lowered by the proxy's anchor-to-eye offset
//! ```
//!
//! Runs once per tick per watched subject; both rays are bounded to
//! `distance / step + 1` samples.

use serde::{Deserialize, Serialize};
use vantage_shared::{
    Orientation, Transform, Vec3, BACKWARD_RAY_DISTANCE, BIRDS_EYE_DISTANCE,
    BIRDS_EYE_FALLBACK_LIFT, BIRDS_EYE_PITCH, MAX_RAY_SAMPLES, PROXY_EYE_OFFSET, RAY_STEP,
    STEEP_PITCH_DROP, STEEP_PITCH_THRESHOLD,
};

use crate::error::ConfigError;
use crate::raytrace::Raytrace;
use crate::world::RegionCells;

/// Geometry of the third-person rig.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRig {
    /// Reach of the backward ray.
    pub backward_distance: f64,
    /// Sample spacing for both rays.
    pub step: f64,
    /// Pitch below which the backward shot is abandoned.
    pub steep_pitch_threshold: f32,
    /// Drop below the eye for the steep pitch shot.
    pub steep_pitch_drop: f64,
    /// Height of the birds-eye shot.
    pub birds_eye_distance: f64,
    /// Lift above the eye when the birds-eye ray is fully blocked.
    pub birds_eye_fallback_lift: f64,
    /// Pitch of the birds-eye shot.
    pub birds_eye_pitch: f32,
    /// Anchor-to-eye offset of the proxy body.
    pub proxy_eye_offset: f64,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            backward_distance: BACKWARD_RAY_DISTANCE,
            step: RAY_STEP,
            steep_pitch_threshold: STEEP_PITCH_THRESHOLD,
            steep_pitch_drop: STEEP_PITCH_DROP,
            birds_eye_distance: BIRDS_EYE_DISTANCE,
            birds_eye_fallback_lift: BIRDS_EYE_FALLBACK_LIFT,
            birds_eye_pitch: BIRDS_EYE_PITCH,
            proxy_eye_offset: PROXY_EYE_OFFSET,
        }
    }
}

impl CameraRig {
    /// Rejects rigs that would make rays unbounded or meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-positive step, negative or
    /// non-finite distances, or a ray needing more than [`MAX_RAY_SAMPLES`]
    /// samples.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.step must be positive, got {}",
                self.step
            )));
        }
        self.check_ray("backward_distance", self.backward_distance)?;
        self.check_ray("birds_eye_distance", self.birds_eye_distance)
    }

    #[allow(clippy::cast_precision_loss)]
    fn check_ray(&self, name: &str, distance: f64) -> Result<(), ConfigError> {
        if !(distance.is_finite() && distance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.{name} must be a non-negative number, got {distance}"
            )));
        }
        let samples = (distance / self.step).floor() + 1.0;
        if samples > MAX_RAY_SAMPLES as f64 {
            return Err(ConfigError::Invalid(format!(
                "camera.{name} needs {samples} samples at this step, at most {MAX_RAY_SAMPLES} allowed"
            )));
        }
        Ok(())
    }
}

/// Which branch of the placement policy produced a transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shot {
    /// Behind the subject, looking along its view.
    ThirdPerson,
    /// Just below the eye, for steep pitch.
    SteepPitch,
    /// Straight above the subject, looking down.
    BirdsEye,
    /// Just above the eye, nothing better was free.
    AboveHead,
}

/// Result of a placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPlacement {
    /// Transform for the proxy body (anchor, not eye).
    pub transform: Transform,
    /// Branch that produced it.
    pub shot: Shot,
}

/// Computes the proxy transform for a subject looking from `eye`.
#[must_use]
pub fn place_camera(eye: Transform, world: &RegionCells<'_>, rig: &CameraRig) -> CameraPlacement {
    let backward = Raytrace::new(eye.position, -eye.direction());
    let clear = backward.most_distant_clear_point(rig.backward_distance, rig.step, world);

    let (camera, shot) = match clear {
        Some(_) if eye.orientation.pitch < rig.steep_pitch_threshold => (
            eye.offset_y(-rig.steep_pitch_drop),
            Shot::SteepPitch,
        ),
        Some(point) => (Transform::new(point, eye.orientation), Shot::ThirdPerson),
        None => birds_eye(eye, world, rig),
    };

    CameraPlacement {
        transform: camera.offset_y(-rig.proxy_eye_offset),
        shot,
    }
}

fn birds_eye(eye: Transform, world: &RegionCells<'_>, rig: &CameraRig) -> (Transform, Shot) {
    let upward = Raytrace::new(eye.position, Vec3::UP);
    if upward.has_obstruction(rig.birds_eye_distance, rig.step, world) {
        (eye.offset_y(rig.birds_eye_fallback_lift), Shot::AboveHead)
    } else {
        let overhead = Orientation::new(eye.orientation.yaw, rig.birds_eye_pitch);
        (
            Transform::new(eye.position.offset_y(rig.birds_eye_distance), overhead),
            Shot::BirdsEye,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CellKind, VoxelGrid};
    use vantage_shared::RegionId;

    const REGION: RegionId = RegionId(0);
    const EPS: f64 = 1e-9;

    fn eye(yaw: f32, pitch: f32) -> Transform {
        // Middle of cell (0, 65, 0), looking along +Z at yaw 0.
        Transform::new(Vec3::new(0.5, 65.5, 0.5), Orientation::new(yaw, pitch))
    }

    #[test]
    fn test_open_world_uses_full_backward_distance() {
        let grid = VoxelGrid::new();
        let world = RegionCells::new(&grid, REGION);
        let placed = place_camera(eye(0.0, 0.0), &world, &CameraRig::default());

        assert_eq!(placed.shot, Shot::ThirdPerson);
        // Four units behind along -Z, then lowered by 1.5.
        let expected = Vec3::new(0.5, 64.0, -3.5);
        assert!(placed.transform.position.distance(expected) < EPS);
        assert_eq!(placed.transform.orientation, Orientation::new(0.0, 0.0));
    }

    #[test]
    fn test_wall_behind_shortens_the_shot() {
        let mut grid = VoxelGrid::new();
        grid.fill(REGION, [-3, 60, -2], [3, 70, -2], CellKind::Stone);
        let world = RegionCells::new(&grid, REGION);
        let placed = place_camera(eye(0.0, 0.0), &world, &CameraRig::default());

        assert_eq!(placed.shot, Shot::ThirdPerson);
        // Samples at z = 0.5, 0.0, -0.5, -1.0 are clear, z = -1.5 is in the wall.
        let expected = Vec3::new(0.5, 64.0, -1.0);
        assert!(placed.transform.position.distance(expected) < EPS);
    }

    #[test]
    fn test_steep_pitch_stays_near_eye() {
        let grid = VoxelGrid::new();
        let world = RegionCells::new(&grid, REGION);
        let placed = place_camera(eye(30.0, -60.0), &world, &CameraRig::default());

        assert_eq!(placed.shot, Shot::SteepPitch);
        let expected = Vec3::new(0.5, 65.5 - 0.25 - 1.5, 0.5);
        assert!(placed.transform.position.distance(expected) < EPS);
        assert_eq!(placed.transform.orientation, Orientation::new(30.0, -60.0));
    }

    #[test]
    fn test_threshold_itself_is_not_steep() {
        let grid = VoxelGrid::new();
        let world = RegionCells::new(&grid, REGION);
        let placed = place_camera(eye(0.0, -55.0), &world, &CameraRig::default());
        assert_eq!(placed.shot, Shot::ThirdPerson);
    }

    #[test]
    fn test_blocked_behind_and_open_above_goes_birds_eye() {
        let mut grid = VoxelGrid::new();
        // Entomb the eye cell; the ray up leaves it after one cell.
        grid.set(REGION, [0, 65, 0], CellKind::Leaves);
        let world = RegionCells::new(&grid, REGION);
        let placed = place_camera(eye(123.0, 10.0), &world, &CameraRig::default());

        assert_eq!(placed.shot, Shot::BirdsEye);
        assert_eq!(placed.transform.orientation, Orientation::new(123.0, 90.0));
        let expected = Vec3::new(0.5, 65.5 + 4.0 - 1.5, 0.5);
        assert!(placed.transform.position.distance(expected) < EPS);
    }

    #[test]
    fn test_everything_blocked_falls_back_above_head() {
        let grid = VoxelGrid::with_ground(200);
        let world = RegionCells::new(&grid, REGION);
        let placed = place_camera(eye(45.0, 20.0), &world, &CameraRig::default());

        assert_eq!(placed.shot, Shot::AboveHead);
        assert_eq!(placed.transform.orientation, Orientation::new(45.0, 20.0));
        let expected = Vec3::new(0.5, 65.5 + 0.25 - 1.5, 0.5);
        assert!(placed.transform.position.distance(expected) < EPS);
    }

    #[test]
    fn test_rig_validation() {
        assert!(CameraRig::default().validate().is_ok());
        let rig = CameraRig {
            step: 0.0,
            ..CameraRig::default()
        };
        assert!(rig.validate().is_err());
    }

    #[test]
    fn test_oversized_rig_stays_bounded() {
        let rig = CameraRig {
            backward_distance: 1e30,
            ..CameraRig::default()
        };
        assert!(matches!(rig.validate(), Err(ConfigError::Invalid(_))));

        // Even unvalidated, placement finishes with a capped ray.
        let grid = VoxelGrid::new();
        let world = RegionCells::new(&grid, REGION);
        let placed = place_camera(eye(0.0, 0.0), &world, &rig);
        assert_eq!(placed.shot, Shot::ThirdPerson);
        assert!(placed.transform.position.z.is_finite());
    }
}
