//! Jog dial gesture handling
//!
//! Pure input translation: pointer samples in, [`JogListener`] calls out.
//! Nothing here blocks or touches the connection.
//!
//! [`JogListener`]: cncjog_core::JogListener

pub mod geometry;
pub mod translator;

pub use geometry::{
    axis_for_angle, divider_angles_deg, highlight_start_deg, label_angle_deg, normalize_delta,
    DialGeometry, DialZone, Point, HIGHLIGHT_SWEEP_DEG,
};
pub use translator::{GestureMode, GestureTranslator, TouchPhase, TouchSample, FLASH_DURATION_MS};
