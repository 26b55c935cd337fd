//! # Spectation Error Types
//!
//! All errors that can surface from the spectation core.

use thiserror::Error;
use vantage_shared::EntityId;

use crate::session::ProxyHandle;

/// Why a subject was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetRejection {
    /// Subject and spectator are the same entity.
    SelfSpectation,
    /// Subject is itself locked into an observing camera.
    Ineligible,
}

impl std::fmt::Display for TargetRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfSpectation => f.write_str("an entity cannot spectate itself"),
            Self::Ineligible => f.write_str("subject is already observing"),
        }
    }
}

/// Failures reported by a View Session implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The spectator's client went away.
    #[error("client of {0} is disconnected")]
    Disconnected(EntityId),

    /// The session does not know this proxy.
    #[error("unknown proxy {0:?}")]
    UnknownProxy(ProxyHandle),

    /// The render layer refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Errors that can occur while starting or maintaining a spectation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpectateError {
    /// Self-spectation or an ineligible subject.
    #[error("invalid target {subject}: {reason}")]
    InvalidTarget {
        /// The refused subject.
        subject: EntityId,
        /// Why it was refused.
        reason: TargetRejection,
    },

    /// Entity is not known to the host.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// The render layer failed and the partial spectation was rolled back.
    #[error("view session failed for spectator {spectator}: {source}")]
    ViewSessionFailure {
        /// Spectator whose spectation was rolled back.
        spectator: EntityId,
        /// Underlying session failure.
        #[source]
        source: SessionError,
    },

    /// Entity is spectating and may not change its mode.
    #[error("{0} may not change mode while spectating")]
    ModeLocked(EntityId),
}

/// Result type for spectation operations.
pub type SpectateResult<T> = Result<T, SpectateError>;

/// Errors while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but do not make sense together.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
