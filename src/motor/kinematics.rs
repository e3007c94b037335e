// Drive mixers for the four-wheel base
// Converts joystick input into front-left/front-right/rear-left/rear-right commands.

use std::f32::consts::{PI, SQRT_2};

use super::limit::limit;
use crate::config::ChassisGeometry;

/// Normalized wheel commands for the four drive motors
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub front_left: f32,
    pub front_right: f32,
    pub rear_left: f32,
    pub rear_right: f32,
}

impl WheelSpeeds {
    pub fn new(front_left: f32, front_right: f32, rear_left: f32, rear_right: f32) -> Self {
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns speeds as array [front_left, front_right, rear_left, rear_right]
    pub fn as_array(&self) -> [f32; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }

    /// Negate the right-side wheels (motors mounted mirrored)
    pub fn invert_right(self) -> Self {
        Self {
            front_right: -self.front_right,
            rear_right: -self.rear_right,
            ..self
        }
    }
}

/// Tank-like mix with rotation bias and a rear blend for mecanum geometry
///
/// # Arguments
/// * `move_y` - Stick Y in [-1, 1] (negative = forward)
/// * `rotate_x` - Stick X in [-1, 1] (positive = turn right)
///
/// The front wheels are mixed so that the wheel aiding the turn takes the larger
/// of move/rotate and the opposing wheel is reduced, which keeps turning authority
/// at low speed. The rear wheels blend both front commands by the wheelbase/track
/// ratio and are scaled back into [-1, 1]; front values are left as mixed.
pub fn tank_mix(move_y: f32, rotate_x: f32, geometry: &ChassisGeometry) -> WheelSpeeds {
    let move_value = limit(-move_y, 1.0);
    let rotate_value = limit(rotate_x, 1.0) / geometry.rotate_reduce;

    let (front_left, front_right) = if move_value >= 0.0 {
        if rotate_value > 0.0 {
            (move_value - rotate_value, move_value.max(rotate_value))
        } else {
            (move_value.max(-rotate_value), move_value + rotate_value)
        }
    } else if rotate_value > 0.0 {
        (-(-move_value).max(rotate_value), move_value + rotate_value)
    } else {
        (move_value - rotate_value, -(-move_value).max(-rotate_value))
    };

    let (rear_left, rear_right) = rear_mix(front_left, front_right, geometry.wheel_ratio());
    let (rear_left, rear_right) = normalize_rear(rear_left, rear_right);

    WheelSpeeds {
        front_left,
        front_right,
        rear_left,
        rear_right,
    }
}

/// Blend the front commands into rear commands by the wheelbase/track ratio
pub fn rear_mix(front_left: f32, front_right: f32, wheel_ratio: f32) -> (f32, f32) {
    let rear_left = front_left * (0.5 + wheel_ratio) + front_right * (0.5 - wheel_ratio);
    let rear_right = front_right * (0.5 + wheel_ratio) + front_left * (0.5 - wheel_ratio);
    (rear_left, rear_right)
}

/// Scale both rear speeds down if either exceeds 1
fn normalize_rear(rear_left: f32, rear_right: f32) -> (f32, f32) {
    let max_speed = rear_left.abs().max(rear_right.abs());
    if max_speed > 1.0 {
        (rear_left / max_speed, rear_right / max_speed)
    } else {
        (rear_left, rear_right)
    }
}

/// Convert a stick position to polar form
///
/// Returns `(magnitude, direction)` with direction in degrees, 0 = forward,
/// positive clockwise (90 = strafe right).
pub fn stick_to_polar(move_x: f32, move_y: f32) -> (f32, f32) {
    let magnitude = move_x.hypot(move_y);
    let direction = move_x.atan2(-move_y) * (180.0 / PI);
    (magnitude, direction)
}

/// Polar mecanum mix
///
/// # Arguments
/// * `magnitude` - Translation speed, limited to [-1, 1]
/// * `direction` - Translation heading in degrees (0 = forward, 90 = right)
/// * `rotation` - Rotation rate in [-1, 1] (positive = clockwise)
///
/// All four wheels are scaled down together if any exceeds 1.
pub fn mecanum_polar(magnitude: f32, direction: f32, rotation: f32) -> WheelSpeeds {
    let magnitude = limit(magnitude, 1.0) * SQRT_2;
    let direction_rad = (direction + 45.0) * (PI / 180.0);
    let cos_d = direction_rad.cos();
    let sin_d = direction_rad.sin();

    let mut speeds = [
        sin_d * magnitude + rotation,
        cos_d * magnitude - rotation,
        cos_d * magnitude + rotation,
        sin_d * magnitude - rotation,
    ];

    let max_magnitude = speeds.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if max_magnitude > 1.0 {
        for speed in &mut speeds {
            *speed /= max_magnitude;
        }
    }

    WheelSpeeds::new(speeds[0], speeds[1], speeds[2], speeds[3])
}
