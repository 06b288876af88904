//! Firmware-specific command formatting
//!
//! Only GRBL's jog subset is emitted: relative moves, spindle speed and
//! work-origin reset.

pub mod grbl;
