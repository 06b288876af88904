//! Jog listener interface
//!
//! The gesture translator reports what the operator asked for through this
//! trait; the jog session implements it to turn intents into commands.

use crate::data::Axis;

/// Listener for motion and jog intents produced by a gesture
pub trait JogListener {
    /// Continuous joystick motion
    ///
    /// `angle_deg` is measured counter-clockwise from +X with screen Y
    /// inverted; `power` is in `[0, 1]`. `(0, 0)` means stop.
    fn on_move(&mut self, angle_deg: f64, power: f64);

    /// One discrete step on a single axis or the spindle
    fn on_jog(&mut self, axis: Axis, step: f64);
}

/// An intent captured by value, in emission order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureIntent {
    /// Continuous motion request
    Move {
        /// Direction in degrees
        angle_deg: f64,
        /// Magnitude in `[0, 1]`
        power: f64,
    },
    /// Discrete jog step
    Jog {
        /// Target axis
        axis: Axis,
        /// Signed step size
        step: f64,
    },
}

impl GestureIntent {
    /// Replay this intent into a listener
    pub fn dispatch(&self, listener: &mut dyn JogListener) {
        match *self {
            GestureIntent::Move { angle_deg, power } => listener.on_move(angle_deg, power),
            GestureIntent::Jog { axis, step } => listener.on_jog(axis, step),
        }
    }
}

/// Collects intents, for callers that want to inspect before acting
impl JogListener for Vec<GestureIntent> {
    fn on_move(&mut self, angle_deg: f64, power: f64) {
        self.push(GestureIntent::Move { angle_deg, power });
    }

    fn on_jog(&mut self, axis: Axis, step: f64) {
        self.push(GestureIntent::Jog { axis, step });
    }
}
