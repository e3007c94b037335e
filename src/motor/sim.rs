// Simulated motor controller bus
//
// Stands in for the CAN bus when no hardware is attached. Devices can be marked
// offline to exercise the construction failure path.

use std::collections::HashSet;

use tracing::debug;

use super::actuator::{Actuator, ActuatorError, ControlMode, NeutralMode, Result};

/// Simulated bus handing out actuators by device id
#[derive(Debug, Clone)]
pub struct SimBus {
    mode: ControlMode,
    offline: HashSet<u8>,
}

impl SimBus {
    /// A bus where every device responds and starts in `mode`
    pub fn new(mode: ControlMode) -> Self {
        Self {
            mode,
            offline: HashSet::new(),
        }
    }

    /// Mark devices as not responding
    pub fn with_offline(mut self, devices: impl IntoIterator<Item = u8>) -> Self {
        self.offline.extend(devices);
        self
    }

    /// Connect to a device, failing if it does not respond
    pub fn connect(&self, device: u8) -> Result<SimActuator> {
        if self.offline.contains(&device) {
            return Err(ActuatorError::NotResponding { device });
        }
        debug!("Sim device {} responding in {:?} mode", device, self.mode);
        Ok(SimActuator::new(device, self.mode))
    }
}

/// Simulated motor controller. Records every value it is commanded.
#[derive(Debug, Clone)]
pub struct SimActuator {
    device: u8,
    mode: ControlMode,
    enabled: bool,
    seed_position: f32,
    max_output_voltage: Option<f32>,
    neutral_mode: NeutralMode,
    commands: Vec<f32>,
}

impl SimActuator {
    pub fn new(device: u8, mode: ControlMode) -> Self {
        Self {
            device,
            mode,
            enabled: false,
            seed_position: 0.0,
            max_output_voltage: None,
            neutral_mode: NeutralMode::Coast,
            commands: Vec::new(),
        }
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.mode = mode;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Position passed to the last `enable_control`
    pub fn seed_position(&self) -> f32 {
        self.seed_position
    }

    pub fn max_output_voltage(&self) -> Option<f32> {
        self.max_output_voltage
    }

    pub fn neutral_mode(&self) -> NeutralMode {
        self.neutral_mode
    }

    /// Every value passed to `set`, oldest first
    pub fn commands(&self) -> &[f32] {
        &self.commands
    }

    pub fn last_command(&self) -> Option<f32> {
        self.commands.last().copied()
    }
}

impl Actuator for SimActuator {
    fn device(&self) -> u8 {
        self.device
    }

    fn control_mode(&self) -> ControlMode {
        self.mode
    }

    fn set(&mut self, value: f32) -> Result<()> {
        // Closed-loop modes only accept setpoints while control is enabled
        let closed_loop = matches!(self.mode, ControlMode::Velocity | ControlMode::Position);
        if closed_loop && !self.enabled {
            return Err(ActuatorError::Disabled {
                device: self.device,
            });
        }
        self.commands.push(value);
        Ok(())
    }

    fn enable_control(&mut self, initial_position: f32) -> Result<()> {
        self.enabled = true;
        self.seed_position = initial_position;
        Ok(())
    }

    fn disable_control(&mut self) -> Result<()> {
        self.enabled = false;
        Ok(())
    }

    fn configure_max_output_voltage(&mut self, volts: f32) -> Result<()> {
        self.max_output_voltage = Some(volts);
        Ok(())
    }

    fn configure_neutral_mode(&mut self, mode: NeutralMode) -> Result<()> {
        self.neutral_mode = mode;
        Ok(())
    }
}
