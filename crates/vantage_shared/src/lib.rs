//! # VANTAGE Shared
//!
//! Common types used by the spectation core, hosts and front-ends.
//!
//! ## Rule
//!
//! This crate holds plain data only. Anything that talks to a world, a
//! session or a clock belongs in `vantage_core`.

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod math;

pub use constants::{
    BACKWARD_RAY_DISTANCE, BIRDS_EYE_DISTANCE, BIRDS_EYE_FALLBACK_LIFT, BIRDS_EYE_PITCH,
    DEFAULT_EYE_HEIGHT, MAX_RAY_SAMPLES, PROXY_EYE_OFFSET, RAY_STEP, STEEP_PITCH_DROP, STEEP_PITCH_THRESHOLD,
    TICK_RATE,
};
pub use ids::{EntityId, RegionId};
pub use math::{head_yaw_angle, Orientation, Transform, Vec3};
