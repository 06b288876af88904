//! GRBL command formatting properties

use cncjog_communication::JogCommand;
use cncjog_core::{Axis, SPINDLE_MAX, SPINDLE_MIN};
use proptest::prelude::*;

fn linear_axis() -> impl Strategy<Value = Axis> {
    prop_oneof![Just(Axis::X), Just(Axis::Y), Just(Axis::Z)]
}

proptest! {
    #[test]
    fn relative_jog_restores_absolute_mode(axis in linear_axis(), distance in -1000.0f64..1000.0) {
        let text = JogCommand::relative(axis, distance).to_gcode();
        let lines: Vec<&str> = text.lines().collect();

        prop_assert!(text.ends_with('\n'));
        prop_assert_eq!(lines.len(), 3);
        prop_assert_eq!(lines[0], "G91");
        prop_assert_eq!(lines[2], "G90");

        let word = lines[1].strip_prefix("G0 ").unwrap();
        prop_assert!(word.starts_with(axis.letter()));
        let magnitude = &word[1..];
        prop_assert_eq!(magnitude.split('.').nth(1).map(str::len), Some(2));
        let parsed: f64 = magnitude.parse().unwrap();
        prop_assert!((parsed - distance).abs() <= 0.005 + 1e-9);
    }

    #[test]
    fn spindle_speed_is_always_in_range(speed in any::<i32>()) {
        let text = JogCommand::spindle(speed).to_gcode();
        let value: i32 = text.trim_end().strip_prefix('S').unwrap().parse().unwrap();
        prop_assert!((SPINDLE_MIN..=SPINDLE_MAX).contains(&value));
        if (SPINDLE_MIN..=SPINDLE_MAX).contains(&speed) {
            prop_assert_eq!(value, speed);
        }
    }
}
