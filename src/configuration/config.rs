use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::types::{CameraSettings, StreamSettings};
use crate::error_handling::types::ConfigError;

/// Application configuration, loaded from a TOML file.
///
/// Every field carries a default, so an empty file (or empty sections) is a
/// valid configuration for a stock Raspberry Pi camera setup. Values are
/// validated after parsing; a configuration that parses but cannot drive the
/// capture pipeline (zero frame rate, unknown rotation, colliding ports) is
/// rejected up front rather than at session start.
///
/// # Examples
///
/// ```toml
/// [camera]
/// width = 1920
/// height = 1080
/// rotation = 270
///
/// [stream]
/// listen_port = 8554
/// settle_delay_ms = 1000
/// ```
#[derive(Debug, PartialEq, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraSettings,
    pub stream: StreamSettings,
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be read,
    /// [`ConfigError::TomlError`] if it is not valid TOML, and a
    /// field-specific variant if validation fails.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 {
            return Err(ConfigError::ZeroValue(String::from("camera.width")));
        }
        if self.camera.height == 0 {
            return Err(ConfigError::ZeroValue(String::from("camera.height")));
        }
        if self.camera.fps == 0 {
            return Err(ConfigError::ZeroValue(String::from("camera.fps")));
        }
        if self.camera.bitrate == 0 {
            return Err(ConfigError::ZeroValue(String::from("camera.bitrate")));
        }
        if !matches!(self.camera.rotation, 0 | 90 | 180 | 270) {
            return Err(ConfigError::BadRotation(self.camera.rotation as i64));
        }
        if self.stream.protocol != "tcp" {
            return Err(ConfigError::BadProtocol(self.stream.protocol.clone()));
        }
        if self.stream.listen_port == self.stream.motion_port {
            return Err(ConfigError::PortConflict(self.stream.listen_port));
        }
        if self.stream.settle_delay_ms == 0 {
            return Err(ConfigError::ZeroValue(String::from(
                "stream.settle_delay_ms",
            )));
        }
        Ok(())
    }
}
