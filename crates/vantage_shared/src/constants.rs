//! # Camera & Timing Constants
//!
//! Default geometry of the third-person rig. Hosts may override every value
//! through `vantage_core::config`, these are the values a fresh install uses.

// =============================================================================
// TIMING
// =============================================================================

/// Simulation tick rate (updates per second).
pub const TICK_RATE: u32 = 20;

// =============================================================================
// CAMERA RIG
// =============================================================================

/// How far behind the eye the third-person ray reaches (world units).
pub const BACKWARD_RAY_DISTANCE: f64 = 4.0;

/// Sample spacing for every camera ray (world units).
///
/// With a 4 unit ray this bounds each cast to 9 samples.
pub const RAY_STEP: f64 = 0.5;

/// Hard cap on samples per camera ray, whatever the rig says.
pub const MAX_RAY_SAMPLES: usize = 64;

/// Pitch (degrees) below which the backward shot is abandoned.
pub const STEEP_PITCH_THRESHOLD: f32 = -55.0;

/// Vertical drop applied to the eye for the steep pitch shot.
pub const STEEP_PITCH_DROP: f64 = 0.25;

/// Height of the birds-eye shot above the eye (world units).
pub const BIRDS_EYE_DISTANCE: f64 = 4.0;

/// Lift above the eye when even the birds-eye ray is fully obstructed.
pub const BIRDS_EYE_FALLBACK_LIFT: f64 = 0.25;

/// Pitch of the birds-eye shot (straight down).
pub const BIRDS_EYE_PITCH: f32 = 90.0;

/// Distance between the proxy body's anchor and its eye line.
pub const PROXY_EYE_OFFSET: f64 = 1.5;

/// Eye height of a standard humanoid body above its feet.
pub const DEFAULT_EYE_HEIGHT: f64 = 1.62;
