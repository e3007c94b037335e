// Interface to a raw motor controller (speed/position controlled actuator)
//
// The ramp layer only talks to hardware through this trait, so a CAN motor
// controller, a serial servo or the simulated bus can sit underneath it.

/// Control modes a motor controller can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Fraction of bus voltage, [-1, 1]
    PercentOutput,
    /// Closed-loop speed in controller-native units
    Velocity,
    /// Closed-loop absolute position
    Position,
    /// Current or voltage control; not ramped
    Other,
}

/// What the motor does when commanded to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeutralMode {
    Brake,
    Coast,
}

/// Error types for actuator communication
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorError {
    #[error("Device {device} not responding")]
    NotResponding { device: u8 },

    #[error("Device {device} reported a fault: {reason}")]
    Fault { device: u8, reason: String },

    #[error("Device {device} is disabled")]
    Disabled { device: u8 },
}

pub type Result<T> = std::result::Result<T, ActuatorError>;

/// A raw motor controller.
///
/// `set` applies the value as-is in the current control mode; no limiting is done
/// at this level.
pub trait Actuator {
    /// Bus id of the device, used in log messages
    fn device(&self) -> u8;

    fn control_mode(&self) -> ControlMode;

    fn set(&mut self, value: f32) -> Result<()>;

    /// Enable closed-loop control, telling the controller where it currently is
    fn enable_control(&mut self, initial_position: f32) -> Result<()>;

    fn disable_control(&mut self) -> Result<()>;

    fn configure_max_output_voltage(&mut self, volts: f32) -> Result<()>;

    fn configure_neutral_mode(&mut self, mode: NeutralMode) -> Result<()>;
}
