// Motor control module for the four-wheel drivetrain
//
// Provides:
// - Actuator interface and a simulated bus
// - Ramped output (velocity/acceleration limits, position settling)
// - Drive mixers (tank-like mix with rear blend, polar mecanum)
// - Drivetrain controller with watchdog

pub mod actuator;
mod driver;
pub mod kinematics;
pub mod limit;
pub mod ramped;
pub mod sim;
pub mod watchdog;

pub use actuator::{Actuator, ActuatorError, ControlMode, NeutralMode};
pub use driver::{
    DRIVE_DEVICE_IDS, DriveController, DriveError, DriveMode, DriveMotors, DriveStrategy, Wheel,
};
pub use kinematics::{WheelSpeeds, mecanum_polar, tank_mix};
pub use limit::limit;
pub use ramped::{RampLimits, RampedActuator};
pub use sim::{SimActuator, SimBus};
pub use watchdog::{SafetyTimer, Watchdog};
