//! Configuration and settings management for CNC Jogger
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats stored in the platform configuration directory.
//!
//! Configuration is organized into logical sections:
//! - Connection preferences (preferred port, automatic selection)
//! - Jog dial tuning (quantum, speed threshold, step sizes, geometry)
//! - Session behavior (move deadband, spindle limit, move streaming)

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use cncjog_core::SPINDLE_MAX;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name used inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used inside the platform configuration directory
pub const CONFIG_DIR_NAME: &str = "cncjog";

/// Supported on-disk formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some(other) => Err(ConfigError::UnsupportedFormat(other.to_string())),
            None => Err(ConfigError::UnsupportedFormat(
                "file has no extension".to_string(),
            )),
        }
    }
}

/// Connection preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Port to connect to when it is attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_port: Option<String>,
    /// Connect to the first candidate when the preferred port is absent
    pub auto_select: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            preferred_port: None,
            auto_select: true,
        }
    }
}

/// Jog dial tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JogDialSettings {
    /// Rotation, in degrees, that produces one jog step
    pub quantum_deg: f64,
    /// Angular speed, in degrees per millisecond, above which coarse steps apply
    pub fast_threshold_deg_per_ms: f64,
    /// Linear step at slow rotation
    pub fine_step: f64,
    /// Linear step at fast rotation
    pub coarse_step: f64,
    /// Spindle step at slow rotation
    pub spindle_fine_step: f64,
    /// Spindle step at fast rotation
    pub spindle_coarse_step: f64,
    /// Gap between the widget edge and the outer ring, in pixels
    pub ring_margin: f64,
    /// Inner ring radius as a fraction of the outer radius
    pub inner_ratio: f64,
    /// Joystick radius as a fraction of the inner radius
    pub joystick_ratio: f64,
}

impl Default for JogDialSettings {
    fn default() -> Self {
        Self {
            quantum_deg: 15.0,
            fast_threshold_deg_per_ms: 0.5,
            fine_step: 0.1,
            coarse_step: 1.0,
            spindle_fine_step: 10.0,
            spindle_coarse_step: 100.0,
            ring_margin: 10.0,
            inner_ratio: 0.6,
            joystick_ratio: 0.8,
        }
    }
}

impl JogDialSettings {
    /// Check step sizes, thresholds and ratios are usable
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("jog_dial.quantum_deg", self.quantum_deg),
            (
                "jog_dial.fast_threshold_deg_per_ms",
                self.fast_threshold_deg_per_ms,
            ),
            ("jog_dial.fine_step", self.fine_step),
            ("jog_dial.coarse_step", self.coarse_step),
            ("jog_dial.spindle_fine_step", self.spindle_fine_step),
            ("jog_dial.spindle_coarse_step", self.spindle_coarse_step),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::out_of_range(key, value));
            }
        }

        if !(self.ring_margin.is_finite() && self.ring_margin >= 0.0) {
            return Err(ConfigError::out_of_range(
                "jog_dial.ring_margin",
                self.ring_margin,
            ));
        }

        for (key, value) in [
            ("jog_dial.inner_ratio", self.inner_ratio),
            ("jog_dial.joystick_ratio", self.joystick_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::out_of_range(key, value));
            }
        }
        Ok(())
    }
}

/// Jog session behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Joystick power at or below which moves are ignored
    pub move_deadband: f64,
    /// Highest spindle speed the session will command
    pub spindle_max: i32,
    /// Send a planar move for every joystick sample above the deadband
    pub stream_continuous_moves: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            move_deadband: 0.1,
            spindle_max: SPINDLE_MAX,
            stream_continuous_moves: false,
        }
    }
}

impl SessionSettings {
    fn validate(&self) -> ConfigResult<()> {
        if !(self.move_deadband >= 0.0 && self.move_deadband < 1.0) {
            return Err(ConfigError::out_of_range(
                "session.move_deadband",
                self.move_deadband,
            ));
        }
        if !(1..=SPINDLE_MAX).contains(&self.spindle_max) {
            return Err(ConfigError::out_of_range(
                "session.spindle_max",
                self.spindle_max,
            ));
        }
        Ok(())
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection preferences
    pub connection: ConnectionSettings,
    /// Jog dial tuning
    pub jog_dial: JogDialSettings,
    /// Session behavior
    pub session: SessionSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no configuration directory on this platform".into())
        })?;
        Ok(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the config at `path`, or at the default location
    ///
    /// A missing file yields defaults; a present but invalid file is an error.
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.jog_dial.validate()?;
        self.session.validate()
    }
}
