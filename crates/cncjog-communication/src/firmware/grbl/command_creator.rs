//! GRBL Jog Command Creator
//!
//! Formats the ASCII, newline-terminated commands sent verbatim to the
//! serial port. Relative moves are wrapped in `G91`/`G90` so the machine is
//! left in absolute mode after every jog.

use cncjog_core::{Axis, SPINDLE_MAX, SPINDLE_MIN};
use std::fmt;

/// A command the jog session can send to the machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JogCommand {
    /// Relative rapid move on one linear axis
    Relative {
        /// Target axis (never `Axis::S`)
        axis: Axis,
        /// Signed distance in machine units
        distance: f64,
    },
    /// Relative rapid move in the XY plane
    Planar {
        /// X distance in machine units
        dx: f64,
        /// Y distance in machine units
        dy: f64,
    },
    /// Absolute spindle speed
    Spindle(i32),
    /// Set the G54 work origin to the current position on X, Y and Z
    ZeroOrigin,
}

impl JogCommand {
    /// Relative move on a linear axis
    pub fn relative(axis: Axis, distance: f64) -> Self {
        Self::Relative { axis, distance }
    }

    /// Spindle speed, clamped to the supported range
    pub fn spindle(speed: i32) -> Self {
        Self::Spindle(speed.clamp(SPINDLE_MIN, SPINDLE_MAX))
    }

    /// Full command text including the trailing newline
    pub fn to_gcode(&self) -> String {
        match self {
            Self::Relative { axis, distance } => {
                format!("G91\nG0 {}{:.2}\nG90\n", axis.letter(), distance)
            }
            Self::Planar { dx, dy } => format!("G91\nG0 X{:.2} Y{:.2}\nG90\n", dx, dy),
            Self::Spindle(speed) => format!("S{}\n", speed),
            Self::ZeroOrigin => "G10 L20 P1 X0 Y0 Z0\n".to_string(),
        }
    }

    /// Command bytes as written to the port
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_gcode().into_bytes()
    }
}

impl fmt::Display for JogCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_gcode().trim_end())
    }
}
