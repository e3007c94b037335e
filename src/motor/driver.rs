// Drivetrain controller for the four-wheel base
//
// Owns the four ramped drive motors and the drivetrain watchdog, and turns
// operator input into wheel commands through the configured drive mode.

use std::fmt;

use tracing::{debug, error, info, warn};

use super::actuator::{Actuator, ActuatorError, NeutralMode};
use super::kinematics::{WheelSpeeds, mecanum_polar, stick_to_polar, tank_mix};
use super::ramped::RampedActuator;
use super::watchdog::Watchdog;
use crate::config::{
    ActuatorTuning, ChassisGeometry, DRIVE_OUTPUT_VOLTAGE_LIMIT, FRONT_LEFT_DEVICE,
    FRONT_RIGHT_DEVICE, REAR_LEFT_DEVICE, REAR_RIGHT_DEVICE,
};
use crate::messages::DriveInput;

/// Device ids in wheel order [front_left, front_right, rear_left, rear_right]
pub const DRIVE_DEVICE_IDS: [u8; 4] = [
    FRONT_LEFT_DEVICE,
    FRONT_RIGHT_DEVICE,
    REAR_LEFT_DEVICE,
    REAR_RIGHT_DEVICE,
];

/// Wheel positions on the chassis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wheel::FrontLeft => "front left",
            Wheel::FrontRight => "front right",
            Wheel::RearLeft => "rear left",
            Wheel::RearRight => "rear right",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Failed to initialize {wheel} drive motor: {source}")]
    Init {
        wheel: Wheel,
        #[source]
        source: ActuatorError,
    },

    #[error("Failed to command {wheel} drive motor: {source}")]
    Output {
        wheel: Wheel,
        #[source]
        source: ActuatorError,
    },
}

pub type Result<T> = std::result::Result<T, DriveError>;

/// Drive modes the chassis can be run in
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DriveMode {
    /// Polar mecanum mix on all four wheels
    Mecanum,
    /// Tank-like front mix with a wheelbase-corrected rear blend
    TankLikeMix,
    /// Not implemented, commands nothing
    SkidSteer,
    /// Not implemented, commands nothing
    SwivelSteer,
}

impl DriveMode {
    /// Whether the right-side motors are commanded with inverted sign
    pub fn inverts_right(self) -> bool {
        !matches!(self, DriveMode::Mecanum)
    }

    pub fn strategy(self) -> Box<dyn DriveStrategy> {
        match self {
            DriveMode::Mecanum => Box::new(MecanumDrive),
            DriveMode::TankLikeMix => Box::new(TankLikeMixDrive),
            DriveMode::SkidSteer | DriveMode::SwivelSteer => Box::new(Unimplemented(self)),
        }
    }
}

/// Mixing strategy for one drive mode
pub trait DriveStrategy {
    /// Wheel speeds for this input, or `None` when the mode commands nothing
    fn wheel_speeds(&self, input: &DriveInput, geometry: &ChassisGeometry) -> Option<WheelSpeeds>;
}

struct MecanumDrive;

impl DriveStrategy for MecanumDrive {
    fn wheel_speeds(&self, input: &DriveInput, _: &ChassisGeometry) -> Option<WheelSpeeds> {
        let (magnitude, direction) = stick_to_polar(input.move_x, input.move_y);
        Some(mecanum_polar(magnitude, direction, input.rotate_x))
    }
}

struct TankLikeMixDrive;

impl DriveStrategy for TankLikeMixDrive {
    fn wheel_speeds(
        &self,
        input: &DriveInput,
        geometry: &ChassisGeometry,
    ) -> Option<WheelSpeeds> {
        Some(tank_mix(input.move_y, input.rotate_x, geometry))
    }
}

struct Unimplemented(DriveMode);

impl DriveStrategy for Unimplemented {
    fn wheel_speeds(&self, _: &DriveInput, _: &ChassisGeometry) -> Option<WheelSpeeds> {
        debug!("Drive mode {:?} has no mixer, nothing commanded", self.0);
        None
    }
}

/// The four drive motors
pub struct DriveMotors<A: Actuator> {
    pub front_left: RampedActuator<A>,
    pub front_right: RampedActuator<A>,
    pub rear_left: RampedActuator<A>,
    pub rear_right: RampedActuator<A>,
}

impl<A: Actuator> DriveMotors<A> {
    /// Construct all four motors using the default device ids
    pub fn new<F>(connect: F, tuning: ActuatorTuning) -> Result<Self>
    where
        F: FnMut(u8) -> std::result::Result<A, ActuatorError>,
    {
        Self::with_device_ids(connect, DRIVE_DEVICE_IDS, tuning)
    }

    /// Construct all four motors, in wheel order, failing on the first one that
    /// does not come up. No retry is attempted.
    pub fn with_device_ids<F>(
        mut connect: F,
        device_ids: [u8; 4],
        tuning: ActuatorTuning,
    ) -> Result<Self>
    where
        F: FnMut(u8) -> std::result::Result<A, ActuatorError>,
    {
        let mut init = |wheel: Wheel, device: u8| -> Result<RampedActuator<A>> {
            // Logged before connecting so a silent device is identifiable
            info!("Initializing {} drive motor (device {})", wheel, device);
            let setup = |mut actuator: A| -> std::result::Result<A, ActuatorError> {
                actuator.configure_max_output_voltage(DRIVE_OUTPUT_VOLTAGE_LIMIT)?;
                actuator.configure_neutral_mode(NeutralMode::Brake)?;
                Ok(actuator)
            };
            let actuator = connect(device)
                .and_then(setup)
                .map_err(|source| DriveError::Init { wheel, source })?;
            Ok(RampedActuator::new(actuator, tuning))
        };

        let motors = Self {
            front_left: init(Wheel::FrontLeft, device_ids[0])?,
            front_right: init(Wheel::FrontRight, device_ids[1])?,
            rear_left: init(Wheel::RearLeft, device_ids[2])?,
            rear_right: init(Wheel::RearRight, device_ids[3])?,
        };
        debug!("Drive motors successfully created");
        Ok(motors)
    }

    pub fn get(&self, wheel: Wheel) -> &RampedActuator<A> {
        match wheel {
            Wheel::FrontLeft => &self.front_left,
            Wheel::FrontRight => &self.front_right,
            Wheel::RearLeft => &self.rear_left,
            Wheel::RearRight => &self.rear_right,
        }
    }

    pub fn get_mut(&mut self, wheel: Wheel) -> &mut RampedActuator<A> {
        match wheel {
            Wheel::FrontLeft => &mut self.front_left,
            Wheel::FrontRight => &mut self.front_right,
            Wheel::RearLeft => &mut self.rear_left,
            Wheel::RearRight => &mut self.rear_right,
        }
    }

    fn disable_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for wheel in Wheel::ALL {
            if let Err(source) = self.get_mut(wheel).disable_control() {
                warn!("Failed to disable {} drive motor: {}", wheel, source);
                first_error.get_or_insert(DriveError::Output { wheel, source });
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<A: Actuator> Drop for DriveMotors<A> {
    fn drop(&mut self) {
        // Leave the motors disabled when the drivetrain goes away
        if self.disable_all().is_err() {
            error!("Drive motors may still be enabled after drop");
        }
    }
}

/// Drivetrain controller
pub struct DriveController<A: Actuator, W: Watchdog> {
    mode: DriveMode,
    strategy: Box<dyn DriveStrategy>,
    geometry: ChassisGeometry,
    motors: DriveMotors<A>,
    watchdog: W,
}

impl<A: Actuator, W: Watchdog> DriveController<A, W> {
    pub fn new(
        mode: DriveMode,
        geometry: ChassisGeometry,
        motors: DriveMotors<A>,
        watchdog: W,
    ) -> Self {
        info!("Drive controller in {:?} mode", mode);
        Self {
            mode,
            strategy: mode.strategy(),
            geometry,
            motors,
            watchdog,
        }
    }

    /// Run one control cycle from operator input
    pub fn drive_robot(&mut self, input: &DriveInput) -> Result<()> {
        self.watchdog.feed();
        match self.strategy.wheel_speeds(input, &self.geometry) {
            Some(speeds) => self.command_wheels(speeds),
            None => Ok(()),
        }
    }

    /// Autonomous cycle. Keeps the drivetrain alive; no motion is commanded.
    pub fn drive_autonomous(&mut self) {
        self.watchdog.feed();
    }

    /// Command the wheels directly, applying this mode's sign convention
    pub fn power_motors(&mut self, speeds: WheelSpeeds) -> Result<()> {
        self.watchdog.feed();
        self.command_wheels(speeds)
    }

    fn command_wheels(&mut self, speeds: WheelSpeeds) -> Result<()> {
        let speeds = if self.mode.inverts_right() {
            speeds.invert_right()
        } else {
            speeds
        };
        debug!(
            "Wheel outputs: fl={:.3} fr={:.3} rl={:.3} rr={:.3}",
            speeds.front_left, speeds.front_right, speeds.rear_left, speeds.rear_right
        );

        let commands = [
            (Wheel::RearRight, speeds.rear_right),
            (Wheel::RearLeft, speeds.rear_left),
            (Wheel::FrontRight, speeds.front_right),
            (Wheel::FrontLeft, speeds.front_left),
        ];
        // Every wheel is commanded even if one fails; the first failure is returned
        let mut first_error = None;
        for (wheel, value) in commands {
            if let Err(source) = self.motors.get_mut(wheel).set_output(value) {
                first_error.get_or_insert(DriveError::Output { wheel, source });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Enable control on all four motors from their last commanded positions
    pub fn enable_control(&mut self) -> Result<()> {
        for wheel in Wheel::ALL {
            self.motors
                .get_mut(wheel)
                .enable_control()
                .map_err(|source| DriveError::Output { wheel, source })?;
        }
        Ok(())
    }

    /// Disable all four motors
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping drive motors");
        self.watchdog.feed();
        self.motors.disable_all()
    }

    pub fn is_alive(&self) -> bool {
        self.watchdog.is_alive()
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn geometry(&self) -> &ChassisGeometry {
        &self.geometry
    }

    pub fn motor(&self, wheel: Wheel) -> &RampedActuator<A> {
        self.motors.get(wheel)
    }

    pub fn motor_mut(&mut self, wheel: Wheel) -> &mut RampedActuator<A> {
        self.motors.get_mut(wheel)
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::actuator::ControlMode;
    use crate::motor::sim::{SimActuator, SimBus};

    #[derive(Default)]
    struct CountingWatchdog {
        feeds: usize,
    }

    impl Watchdog for CountingWatchdog {
        fn feed(&mut self) {
            self.feeds += 1;
        }

        fn is_alive(&self) -> bool {
            self.feeds > 0
        }
    }

    // Ramp of 1 so each command lands unmodified in percent-output mode
    fn passthrough() -> ActuatorTuning {
        ActuatorTuning {
            ramp: 1.0,
            ..ActuatorTuning::default()
        }
    }

    fn controller(mode: DriveMode) -> DriveController<SimActuator, CountingWatchdog> {
        let bus = SimBus::new(ControlMode::PercentOutput);
        let motors = DriveMotors::new(|id| bus.connect(id), passthrough()).unwrap();
        DriveController::new(
            mode,
            ChassisGeometry::default(),
            motors,
            CountingWatchdog::default(),
        )
    }

    fn last(
        drive: &DriveController<SimActuator, CountingWatchdog>,
        wheel: Wheel,
    ) -> Option<f32> {
        drive.motor(wheel).actuator().last_command()
    }

    #[test]
    fn test_construction_configures_motors() {
        let drive = controller(DriveMode::TankLikeMix);
        for (wheel, device) in Wheel::ALL.into_iter().zip(DRIVE_DEVICE_IDS) {
            let actuator = drive.motor(wheel).actuator();
            assert_eq!(actuator.device(), device);
            assert_eq!(
                actuator.max_output_voltage(),
                Some(DRIVE_OUTPUT_VOLTAGE_LIMIT)
            );
            assert_eq!(actuator.neutral_mode(), NeutralMode::Brake);
        }
    }

    #[test]
    fn test_construction_failure_names_wheel() {
        let bus = SimBus::new(ControlMode::PercentOutput).with_offline([REAR_LEFT_DEVICE]);
        let mut attempted = Vec::new();
        let result = DriveMotors::new(
            |id| {
                attempted.push(id);
                bus.connect(id)
            },
            ActuatorTuning::default(),
        );

        match result {
            Err(DriveError::Init { wheel, source }) => {
                assert_eq!(wheel, Wheel::RearLeft);
                assert_eq!(
                    source,
                    ActuatorError::NotResponding {
                        device: REAR_LEFT_DEVICE
                    }
                );
            }
            _ => panic!("expected init failure"),
        }
        // Stops at the first failure, no retry
        assert_eq!(
            attempted,
            vec![FRONT_LEFT_DEVICE, FRONT_RIGHT_DEVICE, REAR_LEFT_DEVICE]
        );
    }

    #[test]
    fn test_every_mode_feeds_watchdog_once() {
        for mode in [
            DriveMode::Mecanum,
            DriveMode::TankLikeMix,
            DriveMode::SkidSteer,
            DriveMode::SwivelSteer,
        ] {
            let mut drive = controller(mode);
            assert!(!drive.is_alive());
            drive.drive_robot(&DriveInput::new(0.2, -0.5, 0.1)).unwrap();
            assert_eq!(drive.watchdog().feeds, 1, "{:?}", mode);
            assert!(drive.is_alive());
        }
    }

    #[test]
    fn test_tank_mix_inverts_right_side() {
        let mut drive = controller(DriveMode::TankLikeMix);
        drive.drive_robot(&DriveInput::new(0.0, -1.0, 0.0)).unwrap();
        assert_eq!(last(&drive, Wheel::FrontLeft), Some(1.0));
        assert_eq!(last(&drive, Wheel::FrontRight), Some(-1.0));
        assert!((last(&drive, Wheel::RearLeft).unwrap() - 1.0).abs() < 1e-5);
        assert!((last(&drive, Wheel::RearRight).unwrap() + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_mecanum_keeps_sign() {
        let mut drive = controller(DriveMode::Mecanum);
        drive.drive_robot(&DriveInput::new(0.0, -1.0, 0.0)).unwrap();
        for wheel in Wheel::ALL {
            assert!((last(&drive, wheel).unwrap() - 1.0).abs() < 1e-5, "{}", wheel);
        }
    }

    #[test]
    fn test_unimplemented_mode_commands_nothing() {
        let mut drive = controller(DriveMode::SkidSteer);
        drive.drive_robot(&DriveInput::new(0.0, -1.0, 0.0)).unwrap();
        for wheel in Wheel::ALL {
            assert!(drive.motor(wheel).actuator().commands().is_empty());
        }
    }

    #[test]
    fn test_outputs_are_ramped() {
        let bus = SimBus::new(ControlMode::Velocity);
        let motors = DriveMotors::new(|id| bus.connect(id), ActuatorTuning::default()).unwrap();
        let mut drive = DriveController::new(
            DriveMode::TankLikeMix,
            ChassisGeometry::default(),
            motors,
            CountingWatchdog::default(),
        );
        drive.enable_control().unwrap();
        drive.drive_robot(&DriveInput::new(0.0, -1.0, 0.0)).unwrap();
        // First cycle moves a ramp fraction of the way
        assert!((last(&drive, Wheel::FrontLeft).unwrap() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_output_error_names_wheel() {
        let bus = SimBus::new(ControlMode::Position);
        let motors = DriveMotors::new(|id| bus.connect(id), ActuatorTuning::default()).unwrap();
        let mut drive = DriveController::new(
            DriveMode::TankLikeMix,
            ChassisGeometry::default(),
            motors,
            CountingWatchdog::default(),
        );
        // Closed-loop control never enabled; rear right is commanded first
        match drive.drive_robot(&DriveInput::neutral()) {
            Err(DriveError::Output { wheel, .. }) => assert_eq!(wheel, Wheel::RearRight),
            _ => panic!("expected output failure"),
        }
        assert_eq!(drive.watchdog().feeds, 1);
    }

    #[test]
    fn test_failed_wheel_does_not_block_others() {
        let bus = SimBus::new(ControlMode::Velocity);
        let motors = DriveMotors::new(|id| bus.connect(id), passthrough()).unwrap();
        let mut drive = DriveController::new(
            DriveMode::TankLikeMix,
            ChassisGeometry::default(),
            motors,
            CountingWatchdog::default(),
        );
        drive.enable_control().unwrap();
        drive.drive_robot(&DriveInput::new(0.0, -1.0, 0.0)).unwrap();
        assert_eq!(last(&drive, Wheel::FrontLeft), Some(1.0));

        drive.motor_mut(Wheel::RearRight).disable_control().unwrap();
        for _ in 0..5 {
            match drive.drive_robot(&DriveInput::neutral()) {
                Err(DriveError::Output { wheel, .. }) => assert_eq!(wheel, Wheel::RearRight),
                _ => panic!("expected rear right failure"),
            }
        }

        // Healthy wheels follow the neutral input every cycle
        for wheel in [Wheel::FrontLeft, Wheel::FrontRight, Wheel::RearLeft] {
            assert_eq!(drive.motor(wheel).actuator().commands().len(), 6, "{}", wheel);
            assert_eq!(last(&drive, wheel).map(f32::abs), Some(0.0), "{}", wheel);
        }
        assert_eq!(drive.motor(Wheel::RearRight).actuator().commands().len(), 1);
    }

    #[test]
    fn test_power_motors_and_autonomous_feed() {
        let mut drive = controller(DriveMode::TankLikeMix);
        drive.power_motors(WheelSpeeds::new(0.1, 0.2, 0.3, 0.4)).unwrap();
        assert_eq!(last(&drive, Wheel::FrontRight), Some(-0.2));
        assert_eq!(last(&drive, Wheel::RearRight), Some(-0.4));
        assert_eq!(drive.watchdog().feeds, 1);

        drive.drive_autonomous();
        assert_eq!(drive.watchdog().feeds, 2);
        assert_eq!(drive.motor(Wheel::FrontLeft).actuator().commands().len(), 1);
    }

    #[test]
    fn test_stop_disables_and_enable_reseeds() {
        let bus = SimBus::new(ControlMode::Position);
        let motors = DriveMotors::new(|id| bus.connect(id), ActuatorTuning::default()).unwrap();
        let mut drive = DriveController::new(
            DriveMode::TankLikeMix,
            ChassisGeometry::default(),
            motors,
            CountingWatchdog::default(),
        );
        drive.enable_control().unwrap();
        drive.motor_mut(Wheel::FrontLeft).set_output(0.05).unwrap();

        drive.stop().unwrap();
        for wheel in Wheel::ALL {
            assert!(!drive.motor(wheel).actuator().is_enabled());
        }

        drive.enable_control().unwrap();
        let front_left = drive.motor(Wheel::FrontLeft);
        assert!(front_left.actuator().is_enabled());
        assert_eq!(front_left.actuator().seed_position(), 0.05);
    }
}
