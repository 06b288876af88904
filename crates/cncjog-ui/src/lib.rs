//! # CNC Jogger UI
//!
//! Input and session layer for CNC Jogger: the jog dial gesture
//! translator, the jog session that turns intents into machine commands,
//! and the status surface and operator log it maintains.

pub mod console;
pub mod device_status;
pub mod gesture;
pub mod session;

pub use console::{ConsoleLine, ConsoleLog, MessageLevel};
pub use device_status::DeviceStatus;
pub use gesture::{DialGeometry, GestureMode, GestureTranslator, Point, TouchPhase, TouchSample};
pub use session::JogSession;

pub use cncjog_settings::{Config, ConnectionSettings, JogDialSettings, SessionSettings};
