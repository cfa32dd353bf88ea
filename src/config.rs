//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! gamepad_slots = 4
//! device_dir = "/dev/input"
//! standard_gamepads = true
//! max_reports_per_tick = 32
//! run_loop_mode = "padframe"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of gamepad slots tracked by the frame state engine.
    pub gamepad_slots: usize,
    /// Directory scanned for `event*` nodes (Linux).
    pub device_dir: PathBuf,
    /// Use the fixed-layout standard protocol (XInput) and hide its HID twins (Windows).
    pub standard_gamepads: bool,
    /// Most HID reports drained per device in one `process()` (Windows).
    pub max_reports_per_tick: usize,
    /// Private run-loop mode used to pump IOKit callbacks (macOS).
    pub run_loop_mode: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gamepad_slots: 4,
            device_dir: PathBuf::from("/dev/input"),
            standard_gamepads: true,
            max_reports_per_tick: 32,
            run_loop_mode: "padframe".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gamepad_slots == 0 {
            return Err(Error::InvalidConfig(
                "gamepad_slots must be at least 1".into(),
            ));
        }
        if self.max_reports_per_tick == 0 {
            return Err(Error::InvalidConfig(
                "max_reports_per_tick must be at least 1".into(),
            ));
        }
        if self.run_loop_mode.is_empty() {
            return Err(Error::InvalidConfig("run_loop_mode must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_override() {
        let c = Config::from_toml_str("gamepad_slots = 8\ndevice_dir = \"/tmp/input\"").unwrap();
        assert_eq!(c.gamepad_slots, 8);
        assert_eq!(c.device_dir, PathBuf::from("/tmp/input"));
        assert!(c.standard_gamepads);
    }

    #[test]
    fn zero_slots_rejected() {
        let err = Config::from_toml_str("gamepad_slots = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn type_errors_surface_as_config_errors() {
        let err = Config::from_toml_str("gamepad_slots = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/nonexistent/padframe.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
