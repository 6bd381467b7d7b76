//! Operator input sources

mod joystick;

pub use joystick::{
    arcade_mix, normalize_axis, DriveIntent, JoystickSampler, JoystickSource, ManualStick,
    BASE_DUTY, DEAD_ZONE, MIN_MAGNITUDE,
};
