//! # Configuration
//!
//! TOML configuration for a VANTAGE host. Every field has a default, so a
//! partial (or empty) file is valid:
//!
//! ```toml
//! tick_rate = 20
//!
//! [camera]
//! backward_distance = 6.0
//!
//! [messages]
//! prefix = "Spectator » "
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use vantage_shared::TICK_RATE;

use crate::error::ConfigError;
use crate::placement::CameraRig;

/// Highest accepted tick rate.
pub const MAX_TICK_RATE: u32 = 1000;

/// Complete host configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VantageConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Camera geometry.
    pub camera: CameraRig,
    /// Texts shown by the command front-end.
    pub messages: Messages,
}

impl Default for VantageConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            camera: CameraRig::default(),
            messages: Messages::default(),
        }
    }
}

impl VantageConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
    /// for malformed TOML and [`ConfigError::Invalid`] for bad values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(ConfigError::Invalid(format!(
                "tick_rate must be between 1 and {MAX_TICK_RATE}, got {}",
                self.tick_rate
            )));
        }
        self.camera.validate()
    }
}

/// Front-end texts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Messages {
    /// Prepended to every message.
    pub prefix: String,
    /// The command was issued by something that is not an entity.
    pub no_player: String,
    /// No active entity has the requested name.
    pub player_not_online: String,
    /// The requested entity cannot be spectated.
    pub invalid_target: String,
    /// A spectator tried to change its mode.
    pub gamemode_change_not_allowed: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            prefix: "Spectator » ".to_string(),
            no_player: "You have to be a player to do that!".to_string(),
            player_not_online: "Player not found!".to_string(),
            invalid_target: "You can't spectate this player!".to_string(),
            gamemode_change_not_allowed: "You're not allowed to change your gamemode!".to_string(),
        }
    }
}

impl Messages {
    /// `text` with the prefix applied.
    #[must_use]
    pub fn prefixed(&self, text: &str) -> String {
        format!("{}{}", self.prefix, text)
    }
}
