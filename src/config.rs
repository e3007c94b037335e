// Loop timing, timeouts, device ids and drivetrain tuning
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Cycle period assumed by the position ramp (seconds). Must match LOOP_HZ.
pub const DELTA_T: f32 = 0.02;

// Operator command timeout, input is zeroed once commands are older than this
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Drivetrain motor-safety expiration
pub const WATCHDOG_EXPIRATION: Duration = Duration::from_millis(100);

// CAN device ids of the drive motor controllers
pub const FRONT_LEFT_DEVICE: u8 = 2;
pub const FRONT_RIGHT_DEVICE: u8 = 3;
pub const REAR_LEFT_DEVICE: u8 = 4;
pub const REAR_RIGHT_DEVICE: u8 = 5;

// Motor controller setup applied at construction
pub const DRIVE_OUTPUT_VOLTAGE_LIMIT: f32 = 12.0;

// Ramp tuning
pub const DRIVE_RAMP: f32 = 0.2;
pub const DRIVE_VELOCITY_LIMIT: f32 = 1.0;
pub const DRIVE_ACCELERATION_LIMIT: f32 = 1.0;
pub const POSITION_TOLERANCE: f32 = 0.2;
pub const SETTLE_TOLERANCE: f32 = 0.1;

// Chassis geometry (inches)
pub const WHEEL_BASE: f32 = 25.0;
pub const WHEEL_TRACK: f32 = 22.25;

// Rotation authority is divided by this in the tank-like mix
pub const ROTATE_REDUCE: f32 = 1.5;

/// Per-actuator ramp configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorTuning {
    /// Fraction of the remaining velocity error closed per cycle, in (0, 1]
    pub ramp: f32,
    pub max_velocity: f32,
    pub max_acceleration: f32,
    pub position_tolerance: f32,
    pub settle_tolerance: f32,
}

impl Default for ActuatorTuning {
    fn default() -> Self {
        Self {
            ramp: DRIVE_RAMP,
            max_velocity: DRIVE_VELOCITY_LIMIT,
            max_acceleration: DRIVE_ACCELERATION_LIMIT,
            position_tolerance: POSITION_TOLERANCE,
            settle_tolerance: SETTLE_TOLERANCE,
        }
    }
}

/// Chassis dimensions used by the drive mixers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChassisGeometry {
    pub wheel_base: f32,
    /// Assumes front and rear track are the same
    pub wheel_track: f32,
    pub rotate_reduce: f32,
}

impl ChassisGeometry {
    pub fn wheel_ratio(&self) -> f32 {
        self.wheel_base / self.wheel_track
    }
}

impl Default for ChassisGeometry {
    fn default() -> Self {
        Self {
            wheel_base: WHEEL_BASE,
            wheel_track: WHEEL_TRACK,
            rotate_reduce: ROTATE_REDUCE,
        }
    }
}
