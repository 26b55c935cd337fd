//! # VANTAGE
//!
//! Front-end and demo host for the spectation core.
//!
//! - [`commands`]: `spectate [name]` and its tab completion
//! - [`simulated`]: a headless View Session with a relocation worker
//! - [`host`]: an in-memory host driving the registry once per tick
//!
//! The core lives in `vantage_core`; this crate only consumes its public API.

#![deny(unsafe_code)]

pub mod commands;
pub mod host;
pub mod simulated;

pub use commands::{complete, spectate, CommandError, CommandOutcome, CommandSender};
pub use host::{DemoHost, HostTick};
pub use simulated::SimulatedSession;
