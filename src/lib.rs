//! # CNC Jogger
//!
//! A touch jog dial for GRBL CNC machines over USB serial:
//! - Rotary ring jogging of X, Y, Z and spindle speed, one step per quantum
//! - Joystick disk for continuous XY motion
//! - Permission-gated serial connection with a background read loop
//!
//! ## Architecture
//!
//! CNC Jogger is organized as a workspace with multiple crates:
//!
//! 1. **cncjog-core** - Axis and position model, jog listener, events, errors
//! 2. **cncjog-communication** - Serial drivers, connection manager, GRBL commands
//! 3. **cncjog-settings** - Configuration file handling and validation
//! 4. **cncjog-ui** - Gesture translator, jog session, status surface
//! 5. **cncjog** - Headless console binary that integrates all crates

pub use cncjog_communication::{
    AutoGrantBroker, ConnectionManager, JogCommand, PermissionBroker, PermissionResponder,
    SerialDriver, SystemSerialDriver, VirtualSerialDriver,
};

pub use cncjog_core::{
    Axis, CandidateDevice, ConnectionError, ConnectionEvent, ConnectionStatus, Error,
    EventDispatcher, GestureIntent, JogListener, MachinePosition, Result,
};

pub use cncjog_settings::{Config, ConnectionSettings, JogDialSettings, SessionSettings};

pub use cncjog_ui::{
    ConsoleLine, DeviceStatus, GestureMode, GestureTranslator, JogSession, TouchPhase,
    TouchSample,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Environment variable selecting JSON log output
pub const LOG_FORMAT_ENV: &str = "CNCJOG_LOG_FORMAT";

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr so console replies on stdout stay readable
/// - RUST_LOG environment variable support, INFO by default
/// - Pretty formatting, or JSON lines when `CNCJOG_LOG_FORMAT=json`
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_line_number(true)
            .pretty();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
