// Message types exchanged with the operator side of the runtime

use serde::{Deserialize, Serialize};

// Operator input, one JSON object per line on stdin.
// Axis values are normalized to [-1, 1] and already deadband-adjusted.
// Stick Y follows joystick convention: pushing forward is negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct DriveInput {
    /// Left stick X (strafe)
    #[serde(default)]
    pub move_x: f32,
    /// Left stick Y (forward/back)
    #[serde(default)]
    pub move_y: f32,
    /// Right stick X (rotation)
    #[serde(default)]
    pub rotate_x: f32,
}

impl DriveInput {
    pub fn new(move_x: f32, move_y: f32, rotate_x: f32) -> Self {
        Self {
            move_x,
            move_y,
            rotate_x,
        }
    }

    /// Neutral sticks
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Health status reported by the runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    /// Drive motors failed to initialize, no output is commanded
    DriveUnavailable,
}
