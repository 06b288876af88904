//! Jog dial geometry
//!
//! The dial is a ring split into four 90° quadrants around an inner
//! joystick disk. Angles are in degrees, measured in screen coordinates
//! (y grows downward), so +90° points at the bottom of the widget.

use cncjog_core::Axis;
use cncjog_settings::JogDialSettings;

/// Sweep of one quadrant's highlight arc, in degrees
pub const HIGHLIGHT_SWEEP_DEG: f64 = 90.0;

/// A point in widget pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Which part of the dial a point falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialZone {
    /// Inside the inner disk
    Joystick,
    /// Between the inner and outer radius
    Ring,
    /// On or beyond the outer radius
    Outside,
}

/// Radii and center derived from the widget size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialGeometry {
    pub width: f64,
    pub height: f64,
    pub center: Point,
    pub outer_radius: f64,
    pub inner_radius: f64,
    pub joystick_radius: f64,
    /// Drawing hint for the joystick hat
    pub hat_radius: f64,
}

impl DialGeometry {
    /// Compute the geometry for a widget of the given size
    ///
    /// Sizes too small for the margin collapse to a zero-radius dial.
    pub fn new(width: f64, height: f64, settings: &JogDialSettings) -> Self {
        let outer_radius = (width.min(height) / 2.0 - settings.ring_margin).max(0.0);
        let inner_radius = outer_radius * settings.inner_ratio;
        let joystick_radius = inner_radius * settings.joystick_ratio;
        Self {
            width,
            height,
            center: Point::new(width / 2.0, height / 2.0),
            outer_radius,
            inner_radius,
            joystick_radius,
            hat_radius: joystick_radius / 4.0,
        }
    }

    /// Classify a pointer position
    pub fn zone(&self, p: Point) -> DialZone {
        let d = self.center.distance_to(p);
        if d < self.inner_radius {
            DialZone::Joystick
        } else if d < self.outer_radius {
            DialZone::Ring
        } else {
            DialZone::Outside
        }
    }

    /// Angle of `p` around the center, in (−180, 180]
    pub fn angle_of(&self, p: Point) -> f64 {
        let angle = (p.y - self.center.y).atan2(p.x - self.center.x).to_degrees();
        if angle <= -180.0 {
            angle + 360.0
        } else {
            angle
        }
    }
}

/// Quadrant owning a ring angle
///
/// (−45, 45] is X, (45, 135] is S, (−135, −45] is Y, everything else Z.
pub fn axis_for_angle(angle_deg: f64) -> Axis {
    if angle_deg > -45.0 && angle_deg <= 45.0 {
        Axis::X
    } else if angle_deg > 45.0 && angle_deg <= 135.0 {
        Axis::S
    } else if angle_deg > -135.0 && angle_deg <= -45.0 {
        Axis::Y
    } else {
        Axis::Z
    }
}

/// Fold a difference of two angles in (−180, 180] back into (−180, 180]
pub fn normalize_delta(delta_deg: f64) -> f64 {
    if delta_deg > 180.0 {
        delta_deg - 360.0
    } else if delta_deg <= -180.0 {
        delta_deg + 360.0
    } else {
        delta_deg
    }
}

/// Start angle of an axis's highlight arc
pub fn highlight_start_deg(axis: Axis) -> f64 {
    match axis {
        Axis::X => -45.0,
        Axis::S => 45.0,
        Axis::Z => 135.0,
        Axis::Y => 225.0,
    }
}

/// Angle at which an axis's label is drawn
pub fn label_angle_deg(axis: Axis) -> f64 {
    match axis {
        Axis::Y => -90.0,
        Axis::X => 0.0,
        Axis::S => 90.0,
        Axis::Z => 180.0,
    }
}

/// Angles of the four quadrant dividers
pub fn divider_angles_deg() -> [f64; 4] {
    [-45.0, 45.0, 135.0, 225.0]
}
