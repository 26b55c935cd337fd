//! # VANTAGE Core
//!
//! Third-person spectation for tick-based simulations: one entity (the
//! subject) is watched by any number of spectators through a shared proxy
//! body that tracks the subject.
//!
//! ## Design Principles
//!
//! 1. **Bounded geometry** - each placement casts at most two short rays
//! 2. **Owned registry** - no globals, collaborators are passed per call
//! 3. **Two-phase start** - show/attach waits for relocation to finish
//! 4. **Tick-thread mutation** - other threads talk through the event bus
//!
//! ## Example
//!
//! ```rust,ignore
//! use vantage_core::{RefreshScheduler, SpectationContext, SpectationRegistry};
//!
//! let mut registry = SpectationRegistry::new(config.camera);
//! let mut scheduler = RefreshScheduler::new();
//! scheduler.start();
//!
//! let mut ctx = SpectationContext::new(&mut entities, &world, &mut session);
//! let ticket = registry.start_spectating(subject, spectator, &mut ctx)?;
//! // ... later, when the host reports the relocation:
//! registry.complete_relocation(ticket, Ok(()), &mut ctx)?;
//!
//! // every tick:
//! scheduler.tick(&mut registry, &mut ctx);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod placement;
pub mod raytrace;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod tick;
pub mod world;

pub use config::{Messages, VantageConfig};
pub use entity::{EntityDirectory, EntityMode, EntitySnapshot, EntityTable, SubjectPose};
pub use error::{ConfigError, SessionError, SpectateError, SpectateResult, TargetRejection};
pub use events::{
    dispatch, EventBus, EventOutcome, EventSender, HostEvent, DEFAULT_EVENT_CAPACITY,
};
pub use placement::{place_camera, CameraPlacement, CameraRig, Shot};
pub use raytrace::Raytrace;
pub use registry::{
    AttachOutcome, InvariantViolation, RefreshOutcome, Spectatable, SpectationContext,
    SpectationRegistry, StopOutcome,
};
pub use scheduler::{RefreshReport, RefreshScheduler};
pub use session::{
    ProxyHandle, RecordingViewSession, RefusedCall, RelocationTicket, SessionCall, ViewSession,
};
pub use tick::{TickLoop, TickStats};
pub use world::{CellClassifier, CellKind, Passability, RegionCells, VoxelGrid};
