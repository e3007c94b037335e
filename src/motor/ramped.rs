// Ramped wrapper around a raw actuator
//
// Enforces velocity/acceleration limits and position settling on top of whatever
// control mode the underlying motor controller is in.

use tracing::debug;

use super::actuator::{Actuator, ControlMode, Result};
use super::limit::limit;
use crate::config::{ActuatorTuning, DELTA_T};

/// Fraction of the remaining distance closed per cycle when near the target
const CLOSE_RAMP: f32 = 0.4;

/// Configured velocity and acceleration ceilings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampLimits {
    pub max_velocity: f32,
    pub max_acceleration: f32,
}

/// Actuator with ramped output.
///
/// Keeps the state it last commanded (`prev_*`), never the raw requested value,
/// and advances it once per `set_output` call.
#[derive(Debug)]
pub struct RampedActuator<A> {
    actuator: A,
    ramp: f32,
    max_velocity: f32,
    max_acceleration: f32,
    position_tolerance: f32,
    settle_tolerance: f32,
    prev_position: f32,
    prev_velocity: f32,
    prev_acceleration: f32,
}

impl<A: Actuator> RampedActuator<A> {
    pub fn new(actuator: A, tuning: ActuatorTuning) -> Self {
        let ramped = Self {
            actuator,
            ramp: tuning.ramp,
            max_velocity: tuning.max_velocity,
            max_acceleration: tuning.max_acceleration,
            position_tolerance: tuning.position_tolerance,
            settle_tolerance: tuning.settle_tolerance,
            prev_position: 0.0,
            prev_velocity: 0.0,
            prev_acceleration: 0.0,
        };
        debug!(
            "Device {} ramp limits: {:?}",
            ramped.actuator.device(),
            ramped.limits()
        );
        ramped
    }

    /// Replace both position-mode thresholds. Not validated.
    ///
    /// Within `tolerance` of the target the position closes linearly; within
    /// `settle_tolerance` it snaps to the target.
    pub fn set_tolerance(&mut self, tolerance: f32, settle_tolerance: f32) {
        self.position_tolerance = tolerance;
        self.settle_tolerance = settle_tolerance;
    }

    pub fn set_max_velocity(&mut self, max_velocity: f32) {
        self.max_velocity = max_velocity;
    }

    pub fn set_max_acceleration(&mut self, max_acceleration: f32) {
        self.max_acceleration = max_acceleration;
    }

    pub fn limits(&self) -> RampLimits {
        RampLimits {
            max_velocity: self.max_velocity,
            max_acceleration: self.max_acceleration,
        }
    }

    /// Enable control, seeding the controller with the last commanded position
    /// so position control does not jump.
    pub fn enable_control(&mut self) -> Result<()> {
        self.actuator.enable_control(self.prev_position)
    }

    /// Enable control from a known position, resetting the tracked position to it
    pub fn enable_control_at(&mut self, initial_position: f32) -> Result<()> {
        self.actuator.enable_control(initial_position)?;
        self.prev_position = initial_position;
        Ok(())
    }

    /// Disable control. The tracked position is kept for the next enable.
    pub fn disable_control(&mut self) -> Result<()> {
        self.actuator.disable_control()
    }

    /// Command the actuator toward `target`, ramped according to its control mode.
    pub fn set_output(&mut self, target: f32) -> Result<()> {
        let mut position = self.prev_position;
        let mut velocity = self.prev_velocity;
        let mut acceleration = self.prev_acceleration;

        match self.actuator.control_mode() {
            ControlMode::PercentOutput | ControlMode::Velocity => {
                // First-order approach toward the requested output
                velocity = self.prev_velocity + (target - self.prev_velocity) * self.ramp;
                self.actuator.set(velocity)?;
            }
            ControlMode::Position => {
                let delta_p = target - self.prev_position;

                if delta_p.abs() <= self.settle_tolerance {
                    position = target;
                } else if delta_p.abs() <= self.position_tolerance {
                    position = self.prev_position + CLOSE_RAMP * delta_p;
                } else {
                    // Trapezoidal step: bound velocity, then the acceleration to reach it
                    let desired_velocity = limit(delta_p / DELTA_T, self.max_velocity);
                    acceleration = limit(
                        (desired_velocity - self.prev_velocity) / DELTA_T,
                        self.max_acceleration,
                    );
                    velocity = self.prev_velocity + acceleration * DELTA_T;
                    position = self.prev_position
                        + self.prev_velocity * DELTA_T
                        + 0.5 * acceleration * DELTA_T * DELTA_T;
                }
                self.actuator.set(position)?;
            }
            ControlMode::Other => {
                self.actuator.set(target)?;
            }
        }

        self.prev_position = position;
        self.prev_velocity = velocity;
        self.prev_acceleration = acceleration;
        Ok(())
    }

    /// Last commanded position (not a sensor reading)
    pub fn get(&self) -> f32 {
        self.prev_position
    }

    /// Last commanded velocity
    pub fn velocity(&self) -> f32 {
        self.prev_velocity
    }

    /// Last commanded acceleration
    pub fn acceleration(&self) -> f32 {
        self.prev_acceleration
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}
