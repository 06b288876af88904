//! # CNC Jogger Core
//!
//! Core types, traits, and events shared by the CNC Jogger crates.
//! Provides the machine axis and position model, the jog listener
//! interface, connection events, and the error hierarchy.

pub mod core;
pub mod data;
pub mod error;
pub mod types;

pub use core::{
    event::{ConnectionEvent, EventDispatcher},
    listener::{GestureIntent, JogListener},
};

pub use data::{
    Axis, CandidateDevice, ConnectionStatus, MachinePosition, SPINDLE_MAX, SPINDLE_MIN,
};

pub use error::{ConnectionError, Error, Result};

pub use types::{thread_safe, DataCallback, ThreadSafe};
