//! Pointer gestures to jog intents
//!
//! A press inside the inner disk drives the joystick hat and reports
//! continuous `on_move` samples. A press on the ring selects the quadrant's
//! axis; rotating around the center then reports one `on_jog` per quantum of
//! rotation, with the step size chosen by angular speed.

use super::geometry::{axis_for_angle, normalize_delta, DialGeometry, DialZone, Point};
use cncjog_core::{Axis, JogListener};
use cncjog_settings::{ConfigResult, JogDialSettings};
use tracing::trace;

/// How long a flashed quadrant stays highlighted
pub const FLASH_DURATION_MS: u64 = 100;

/// Pointer event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer event in widget coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    pub phase: TouchPhase,
    pub x: f64,
    pub y: f64,
    /// Monotonic event time in milliseconds
    pub timestamp_ms: u64,
}

impl TouchSample {
    pub fn new(phase: TouchPhase, x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            phase,
            x,
            y,
            timestamp_ms,
        }
    }

    pub fn down(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self::new(TouchPhase::Down, x, y, timestamp_ms)
    }

    pub fn moved(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self::new(TouchPhase::Move, x, y, timestamp_ms)
    }

    pub fn up(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self::new(TouchPhase::Up, x, y, timestamp_ms)
    }

    fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Active interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureMode {
    #[default]
    Idle,
    Translate,
    Rotary,
}

/// Gesture state machine for the jog dial
#[derive(Debug, Clone)]
pub struct GestureTranslator {
    settings: JogDialSettings,
    geometry: DialGeometry,
    mode: GestureMode,
    active_axis: Option<Axis>,
    hat: Point,
    last_touch: Point,
    last_angle_deg: f64,
    accumulator_deg: f64,
    last_event_time_ms: u64,
    flash: Option<(Axis, u64)>,
}

impl GestureTranslator {
    /// Translator with default tuning for a widget of the given size
    pub fn new(width: f64, height: f64) -> Self {
        Self::build(width, height, JogDialSettings::default())
    }

    /// Translator with explicit tuning
    ///
    /// Rejects settings that `JogDialSettings::validate` refuses, such as a
    /// zero or non-finite quantum.
    pub fn with_settings(
        width: f64,
        height: f64,
        settings: JogDialSettings,
    ) -> ConfigResult<Self> {
        settings.validate()?;
        Ok(Self::build(width, height, settings))
    }

    fn build(width: f64, height: f64, settings: JogDialSettings) -> Self {
        let geometry = DialGeometry::new(width, height, &settings);
        Self {
            settings,
            geometry,
            mode: GestureMode::Idle,
            active_axis: None,
            hat: geometry.center,
            last_touch: geometry.center,
            last_angle_deg: 0.0,
            accumulator_deg: 0.0,
            last_event_time_ms: 0,
            flash: None,
        }
    }

    /// Recompute geometry for a new widget size; the hat returns to center
    pub fn resize(&mut self, width: f64, height: f64) {
        self.geometry = DialGeometry::new(width, height, &self.settings);
        self.hat = self.geometry.center;
    }

    pub fn geometry(&self) -> &DialGeometry {
        &self.geometry
    }

    pub fn settings(&self) -> &JogDialSettings {
        &self.settings
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    /// Axis selected by the current rotary gesture
    pub fn active_axis(&self) -> Option<Axis> {
        self.active_axis
    }

    pub fn hat_position(&self) -> Point {
        self.hat
    }

    /// Rotation carried over toward the next jog, in degrees
    pub fn accumulator_deg(&self) -> f64 {
        self.accumulator_deg
    }

    /// Briefly highlight a quadrant, e.g. after a keyboard jog
    pub fn flash(&mut self, axis: Axis, now_ms: u64) {
        self.flash = Some((axis, now_ms));
    }

    /// Quadrant the drawing layer should highlight at `now_ms`
    pub fn highlighted_axis(&self, now_ms: u64) -> Option<Axis> {
        self.active_axis.or_else(|| match self.flash {
            Some((axis, at)) if now_ms.saturating_sub(at) < FLASH_DURATION_MS => Some(axis),
            _ => None,
        })
    }

    /// Feed one pointer event; intents go to `listener`
    ///
    /// Always returns `true`: every pointer event on the dial is consumed.
    pub fn handle(&mut self, sample: TouchSample, listener: &mut dyn JogListener) -> bool {
        match sample.phase {
            TouchPhase::Down => self.pointer_down(sample),
            TouchPhase::Move => match self.mode {
                GestureMode::Translate => self.translate(sample, listener),
                GestureMode::Rotary => self.rotate(sample, listener),
                GestureMode::Idle => {}
            },
            TouchPhase::Up | TouchPhase::Cancel => self.release(listener),
        }
        true
    }

    fn pointer_down(&mut self, sample: TouchSample) {
        let p = sample.point();
        match self.geometry.zone(p) {
            DialZone::Joystick => {
                self.mode = GestureMode::Translate;
                self.active_axis = None;
                self.last_touch = p;
            }
            DialZone::Ring => {
                let angle = self.geometry.angle_of(p);
                let axis = axis_for_angle(angle);
                trace!("Rotary gesture on {} at {:.1}°", axis, angle);
                self.mode = GestureMode::Rotary;
                self.active_axis = Some(axis);
                self.last_angle_deg = angle;
                self.accumulator_deg = 0.0;
                self.last_event_time_ms = sample.timestamp_ms;
            }
            DialZone::Outside => {
                self.mode = GestureMode::Idle;
                self.active_axis = None;
            }
        }
    }

    fn translate(&mut self, sample: TouchSample, listener: &mut dyn JogListener) {
        let p = sample.point();
        let center = self.geometry.center;
        let radius = self.geometry.joystick_radius;

        let mut hat = Point::new(
            self.hat.x + (p.x - self.last_touch.x),
            self.hat.y + (p.y - self.last_touch.y),
        );
        self.last_touch = p;

        let displacement = center.distance_to(hat);
        let power = if radius <= 0.0 {
            hat = center;
            0.0
        } else if displacement >= radius {
            let scale = radius / displacement;
            hat = Point::new(
                center.x + (hat.x - center.x) * scale,
                center.y + (hat.y - center.y) * scale,
            );
            1.0
        } else {
            displacement / radius
        };
        self.hat = hat;

        let angle = (center.y - hat.y).atan2(hat.x - center.x).to_degrees();
        listener.on_move(angle, power);
    }

    fn rotate(&mut self, sample: TouchSample, listener: &mut dyn JogListener) {
        let Some(axis) = self.active_axis else {
            return;
        };

        let angle = self.geometry.angle_of(sample.point());
        let delta = normalize_delta(angle - self.last_angle_deg);
        self.accumulator_deg += delta;

        let dt = sample.timestamp_ms as i64 - self.last_event_time_ms as i64;
        let speed = if dt <= 0 {
            f64::INFINITY
        } else {
            delta.abs() / dt as f64
        };
        let step = self.step_for(axis, speed > self.settings.fast_threshold_deg_per_ms);

        let quantum = self.settings.quantum_deg;
        while self.accumulator_deg.abs() >= quantum {
            let sign = self.accumulator_deg.signum();
            listener.on_jog(axis, step * sign);
            self.accumulator_deg -= quantum * sign;
            self.flash = Some((axis, sample.timestamp_ms));
        }

        self.last_angle_deg = angle;
        self.last_event_time_ms = sample.timestamp_ms;
    }

    fn step_for(&self, axis: Axis, fast: bool) -> f64 {
        match (axis.is_spindle(), fast) {
            (true, false) => self.settings.spindle_fine_step,
            (true, true) => self.settings.spindle_coarse_step,
            (false, false) => self.settings.fine_step,
            (false, true) => self.settings.coarse_step,
        }
    }

    fn release(&mut self, listener: &mut dyn JogListener) {
        if self.mode == GestureMode::Translate {
            listener.on_move(0.0, 0.0);
        }
        self.hat = self.geometry.center;
        self.mode = GestureMode::Idle;
        self.active_axis = None;
        self.accumulator_deg = 0.0;
    }
}
