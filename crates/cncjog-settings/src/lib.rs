//! CNC Jogger Settings Crate
//!
//! Handles application configuration: jog dial tuning, session behavior and
//! connection preferences, persisted as JSON or TOML.

pub mod config;
pub mod error;

pub use config::{Config, ConfigFormat, ConnectionSettings, JogDialSettings, SessionSettings};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
