//! Mathematical types shared between the core and its hosts.
//!
//! World coordinates are `f64` so that positions far from the origin keep
//! sub-cell precision. Angles are `f32` degrees.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 3D Vector - position, direction, offset
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f64,
    /// Y component (vertical)
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Unit vector pointing up
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Unit-length copy of this vector, or `None` for a degenerate vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len < 1e-9 || !len.is_finite() {
            return None;
        }
        Some(self * (1.0 / len))
    }

    /// Copy of this vector moved along the vertical axis.
    #[must_use]
    pub fn offset_y(self, dy: f64) -> Self {
        Self::new(self.x, self.y + dy, self.z)
    }

    /// Integer coordinates of the world cell containing this point.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn cell(self) -> [i32; 3] {
        [
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        ]
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Yaw/pitch pair in degrees.
///
/// Pitch follows the block-game convention: `+90` looks straight down,
/// `-90` straight up. Yaw `0` faces `+Z`, increasing clockwise seen from
/// above.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Orientation {
    /// Horizontal rotation in degrees.
    pub yaw: f32,
    /// Vertical rotation in degrees.
    pub pitch: f32,
}

impl Orientation {
    /// Creates a new orientation
    #[must_use]
    pub const fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }

    /// Unit look direction for this orientation.
    #[must_use]
    pub fn direction(self) -> Vec3 {
        let yaw = f64::from(self.yaw).to_radians();
        let pitch = f64::from(self.pitch).to_radians();
        let xz = pitch.cos();
        Vec3::new(-yaw.sin() * xz, -pitch.sin(), yaw.cos() * xz)
    }
}

/// Position + orientation of a body or camera.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Transform {
    /// Position
    pub position: Vec3,
    /// Orientation
    pub orientation: Orientation,
}

impl Transform {
    /// Creates a new transform
    #[must_use]
    pub const fn new(position: Vec3, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Same transform moved along the vertical axis.
    #[must_use]
    pub fn offset_y(self, dy: f64) -> Self {
        Self::new(self.position.offset_y(dy), self.orientation)
    }

    /// Look direction of this transform.
    #[must_use]
    pub fn direction(self) -> Vec3 {
        self.orientation.direction()
    }
}

/// Encodes a yaw into the 1/256-turn angle unit used for head rotation on
/// the wire. Fractional degrees are dropped before scaling.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#[must_use]
pub fn head_yaw_angle(yaw: f32) -> i8 {
    let whole_degrees = yaw as i32;
    let steps = (whole_degrees as f32 * 256.0 / 360.0) as i32;
    steps as i8
}
