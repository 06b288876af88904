//! Tests for the machine position model

use cncjog_core::{Axis, MachinePosition, SPINDLE_MAX, SPINDLE_MIN};
use proptest::prelude::*;

#[test]
fn test_jogs_accumulate_per_axis() {
    let mut pos = MachinePosition::new();
    pos.apply_linear(Axis::X, 1.0);
    pos.apply_linear(Axis::X, -0.1);
    pos.apply_linear(Axis::Z, 0.1);
    pos.apply_linear(Axis::S, 5.0);

    assert!((pos.x - 0.9).abs() < 1e-9);
    assert_eq!(pos.y, 0.0);
    assert!((pos.z - 0.1).abs() < 1e-9);
    assert_eq!(pos.s, 0);
}

#[test]
fn test_zero_keeps_spindle() {
    let mut pos = MachinePosition::new();
    pos.apply_linear(Axis::Y, 3.0);
    pos.adjust_spindle(100);
    pos.zero_linear();

    assert_eq!((pos.x, pos.y, pos.z), (0.0, 0.0, 0.0));
    assert_eq!(pos.s, 100);
}

proptest! {
    #[test]
    fn spindle_stays_in_range(steps in prop::collection::vec(-20_000i32..20_000, 0..64)) {
        let mut pos = MachinePosition::new();
        for step in steps {
            let s = pos.adjust_spindle(step);
            prop_assert!((SPINDLE_MIN..=SPINDLE_MAX).contains(&s));
            prop_assert_eq!(s, pos.s);
        }
    }

    #[test]
    fn spindle_saturates_at_extremes(step in prop_oneof![Just(i32::MIN), Just(i32::MAX)]) {
        let mut pos = MachinePosition::new();
        pos.adjust_spindle(5_000);
        let s = pos.adjust_spindle(step);
        prop_assert!(s == SPINDLE_MIN || s == SPINDLE_MAX);
    }
}
