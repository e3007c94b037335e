// Symmetric clamp shared by the ramp and the drive mixers

/// Limit `input` to `[-max, max]`, preserving sign.
///
/// `max` is expected to be non-negative; it is not checked.
pub fn limit(input: f32, max: f32) -> f32 {
    if input > max {
        max
    } else if input < -max {
        -max
    } else {
        input
    }
}
