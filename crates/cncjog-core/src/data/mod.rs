//! Data models for axes, machine position, and device information
//!
//! This module provides:
//! - The four jog targets (X, Y, Z and spindle speed S)
//! - The accumulated machine position model
//! - Candidate device descriptions and the derived connection status

pub mod device;

pub use device::{CandidateDevice, ConnectionStatus};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest spindle speed the position model will hold
pub const SPINDLE_MIN: i32 = 0;

/// Highest spindle speed the position model will hold
pub const SPINDLE_MAX: i32 = 10_000;

/// A jog target: one of the three linear axes or the spindle speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X linear axis
    X,
    /// Y linear axis
    Y,
    /// Z linear axis
    Z,
    /// Spindle speed
    S,
}

impl Axis {
    /// All jog targets in dial order
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::S];

    /// G-code letter for this target
    pub fn letter(&self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::S => 'S',
        }
    }

    /// Whether this target is the spindle rather than a linear axis
    pub fn is_spindle(&self) -> bool {
        matches!(self, Axis::S)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Axis::X),
            "Y" => Ok(Axis::Y),
            "Z" => Ok(Axis::Z),
            "S" => Ok(Axis::S),
            other => Err(format!("Unknown axis: {}", other)),
        }
    }
}

/// Accumulated machine position as commanded by the operator
///
/// Only jog and move intents change this model; responses from the
/// machine are never parsed back into it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MachinePosition {
    /// X-axis position in machine units
    pub x: f64,
    /// Y-axis position in machine units
    pub y: f64,
    /// Z-axis position in machine units
    pub z: f64,
    /// Spindle speed, always within `SPINDLE_MIN..=SPINDLE_MAX`
    pub s: i32,
}

impl MachinePosition {
    /// Create a position at the origin with the spindle stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relative move to one linear axis
    ///
    /// Spindle steps go through [`MachinePosition::adjust_spindle`] instead;
    /// passing `Axis::S` here is ignored.
    pub fn apply_linear(&mut self, axis: Axis, delta: f64) {
        match axis {
            Axis::X => self.x += delta,
            Axis::Y => self.y += delta,
            Axis::Z => self.z += delta,
            Axis::S => {}
        }
    }

    /// Add a spindle step, saturating at the spindle limits
    ///
    /// Returns the new spindle speed.
    pub fn adjust_spindle(&mut self, step: i32) -> i32 {
        self.s = self
            .s
            .saturating_add(step)
            .clamp(SPINDLE_MIN, SPINDLE_MAX);
        self.s
    }

    /// Reset the linear axes to zero, leaving the spindle untouched
    pub fn zero_linear(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.z = 0.0;
    }
}

impl fmt::Display for MachinePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X:{:.1} Y:{:.1} Z:{:.1} S:{}",
            self.x, self.y, self.z, self.s
        )
    }
}
