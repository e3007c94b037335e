// 50 Hz drive loop with operator-command watchdog
// If operator input stops arriving, the drivetrain is driven with neutral input
// instead of repeating the last command.

use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::config::{
    ActuatorTuning, CMD_TIMEOUT, ChassisGeometry, LOOP_HZ, WATCHDOG_EXPIRATION,
};
use crate::messages::{DriveInput, RuntimeHealth};
use crate::motor::{
    Actuator, ControlMode, DriveController, DriveMode, DriveMotors, SafetyTimer, SimActuator,
    SimBus, Watchdog,
};

/// Startup options assembled by the binary
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub drive_mode: DriveMode,
    pub control_mode: ControlMode,
    pub tuning: ActuatorTuning,
    pub geometry: ChassisGeometry,
    /// Devices the simulated bus reports as not responding
    pub offline_devices: Vec<u8>,
}

pub struct Runtime {
    latest_cmd: Option<DriveInput>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
    drive_available: bool,
}

impl Runtime {
    pub fn new(drive_available: bool) -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: if drive_available {
                RuntimeHealth::CmdStale // Start stale until first cmd
            } else {
                RuntimeHealth::DriveUnavailable
            },
            drive_available,
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: DriveInput) {
        debug!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Input for this cycle, neutral once the latest command is stale
    pub fn compute_input(&mut self) -> DriveInput {
        self.compute_input_at(Instant::now())
    }

    fn compute_input_at(&mut self, now: Instant) -> DriveInput {
        let cmd_age = now.saturating_duration_since(self.cmd_received_at);

        let (health, input) = match self.latest_cmd {
            Some(cmd) if cmd_age <= CMD_TIMEOUT => (RuntimeHealth::Ok, cmd),
            _ => (RuntimeHealth::CmdStale, DriveInput::neutral()),
        };
        let health = if self.drive_available {
            health
        } else {
            RuntimeHealth::DriveUnavailable
        };

        if health != self.health {
            match health {
                RuntimeHealth::Ok => info!("Operator commands resumed"),
                RuntimeHealth::CmdStale => {
                    warn!("Command stale ({:?} old), driving neutral", cmd_age)
                }
                RuntimeHealth::DriveUnavailable => warn!("Drive unavailable"),
            }
            self.health = health;
        }
        input
    }
}

/// Parse one line of operator input
pub fn parse_command(line: &str) -> Result<DriveInput, serde_json::Error> {
    serde_json::from_str(line.trim())
}

/// Build the drivetrain. Construction failures are reported here and leave the
/// runtime without drive output; they are not retried.
pub fn build_drive(
    options: &RuntimeOptions,
) -> Option<DriveController<SimActuator, SafetyTimer>> {
    let bus = SimBus::new(options.control_mode)
        .with_offline(options.offline_devices.iter().copied());

    let motors = match DriveMotors::new(|id| bus.connect(id), options.tuning) {
        Ok(motors) => motors,
        Err(e) => {
            error!("Error creating drive motors: {}", e);
            return None;
        }
    };

    let mut drive = DriveController::new(
        options.drive_mode,
        options.geometry,
        motors,
        SafetyTimer::new(WATCHDOG_EXPIRATION),
    );
    if let Err(e) = drive.enable_control() {
        error!("Error enabling drive motors: {}", e);
        return None;
    }
    Some(drive)
}

/// Drive-side state carried across cycles so faults are logged on transitions
#[derive(Debug, Default)]
pub struct DriveStatus {
    started: bool,
    failing: bool,
}

impl DriveStatus {
    pub fn is_failing(&self) -> bool {
        self.failing
    }
}

/// Run one drive cycle. An expired drive watchdog (the loop stalled) disables
/// the motors before control resumes from the last commanded state.
pub fn drive_cycle<A: Actuator, W: Watchdog>(
    drive: &mut DriveController<A, W>,
    input: &DriveInput,
    status: &mut DriveStatus,
) {
    if status.started && !drive.is_alive() {
        warn!("Drive watchdog expired, resetting drive motors");
        if let Err(e) = drive.stop().and_then(|_| drive.enable_control()) {
            error!("Failed to reset drive motors: {}", e);
        }
    }
    status.started = true;

    match drive.drive_robot(input) {
        Ok(()) if status.failing => {
            info!("Drive cycle recovered");
            status.failing = false;
        }
        Ok(()) => {}
        Err(e) if !status.failing => {
            warn!("Drive cycle failed: {}", e);
            status.failing = true;
        }
        Err(e) => debug!("Drive cycle still failing: {}", e),
    }
}

/// Forward operator input lines from stdin
async fn read_commands(tx: mpsc::Sender<DriveInput>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match parse_command(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to parse command: {}", e),
            },
            Ok(None) => {
                info!("Operator input closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read operator input: {}", e);
                break;
            }
        }
    }
}

pub async fn run(
    options: RuntimeOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing drivetrain...");
    let mut drive = build_drive(&options);
    let mut runtime = Runtime::new(drive.is_some());

    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(read_commands(tx));

    // Skip missed ticks: a burst of catch-up cycles would each advance the ramp by
    // a full DELTA_T and outrun max_velocity in real time
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status = DriveStatus::default();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Runtime started: {}Hz loop, {}ms command timeout, {:?} mode",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        options.drive_mode
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            result = &mut shutdown => {
                result?;
                info!("Shutdown requested");
                break;
            }
        }

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(cmd) = rx.try_recv() {
            runtime.on_command(cmd);
        }

        // 2. Compute input (includes command watchdog)
        let input = runtime.compute_input();

        // 3. Drive
        if let Some(drive) = drive.as_mut() {
            drive_cycle(drive, &input, &mut status);
        }
    }

    if let Some(drive) = drive.as_mut() {
        drive.stop()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RuntimeOptions {
        RuntimeOptions {
            drive_mode: DriveMode::TankLikeMix,
            control_mode: ControlMode::Velocity,
            tuning: ActuatorTuning::default(),
            geometry: ChassisGeometry::default(),
            offline_devices: Vec::new(),
        }
    }

    #[test]
    fn test_stale_until_first_command() {
        let mut runtime = Runtime::new(true);
        assert_eq!(runtime.compute_input(), DriveInput::neutral());
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);

        let cmd = DriveInput::new(0.0, -0.5, 0.2);
        runtime.on_command(cmd);
        assert_eq!(runtime.compute_input(), cmd);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn test_old_command_goes_stale() {
        let mut runtime = Runtime::new(true);
        runtime.on_command(DriveInput::new(0.0, -1.0, 0.0));
        let later = Instant::now() + CMD_TIMEOUT + Duration::from_millis(10);
        assert_eq!(runtime.compute_input_at(later), DriveInput::neutral());
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
    }

    #[test]
    fn test_unavailable_drive_health() {
        let mut runtime = Runtime::new(false);
        runtime.on_command(DriveInput::new(0.0, -1.0, 0.0));
        runtime.compute_input();
        assert_eq!(runtime.health(), RuntimeHealth::DriveUnavailable);
    }

    #[test]
    fn test_parse_command() {
        let cmd =
            parse_command(" {\"move_x\":0.1,\"move_y\":-0.4,\"rotate_x\":0.0}\n").unwrap();
        assert_eq!(cmd, DriveInput::new(0.1, -0.4, 0.0));
        assert!(parse_command("forward").is_err());
    }

    #[test]
    fn test_build_drive_enables_motors() {
        let drive = build_drive(&options()).unwrap();
        assert_eq!(drive.mode(), DriveMode::TankLikeMix);
        assert!(
            drive
                .motor(crate::motor::Wheel::RearRight)
                .actuator()
                .is_enabled()
        );
    }

    #[test]
    fn test_drive_cycle_tracks_failure_transitions() {
        let options = RuntimeOptions {
            control_mode: ControlMode::Position,
            ..options()
        };
        let bus = SimBus::new(options.control_mode);
        let motors = DriveMotors::new(|id| bus.connect(id), options.tuning).unwrap();
        let mut drive = DriveController::new(
            options.drive_mode,
            options.geometry,
            motors,
            SafetyTimer::new(Duration::from_secs(60)),
        );
        let mut status = DriveStatus::default();

        // Position control not enabled yet, every cycle fails
        for _ in 0..3 {
            drive_cycle(&mut drive, &DriveInput::neutral(), &mut status);
            assert!(status.is_failing());
        }

        drive.enable_control().unwrap();
        drive_cycle(&mut drive, &DriveInput::neutral(), &mut status);
        assert!(!status.is_failing());
    }

    #[test]
    fn test_drive_cycle_resets_after_stall() {
        let bus = SimBus::new(ControlMode::Velocity);
        let motors = DriveMotors::new(|id| bus.connect(id), ActuatorTuning::default()).unwrap();
        let mut drive = DriveController::new(
            DriveMode::TankLikeMix,
            ChassisGeometry::default(),
            motors,
            SafetyTimer::new(Duration::from_millis(50)),
        );
        drive.enable_control().unwrap();
        let mut status = DriveStatus::default();

        drive_cycle(&mut drive, &DriveInput::new(0.0, -1.0, 0.0), &mut status);
        std::thread::sleep(Duration::from_millis(100));
        assert!(!drive.is_alive());

        // Motors are disabled and re-enabled, so the cycle still goes through
        drive_cycle(&mut drive, &DriveInput::new(0.0, -1.0, 0.0), &mut status);
        assert!(!status.is_failing());
        assert!(drive.is_alive());
        let front_left = drive.motor(crate::motor::Wheel::FrontLeft).actuator();
        assert!(front_left.is_enabled());
        assert_eq!(front_left.commands().len(), 2);
    }

    #[test]
    fn test_build_drive_offline_device() {
        let options = RuntimeOptions {
            offline_devices: vec![crate::config::FRONT_RIGHT_DEVICE],
            ..options()
        };
        assert!(build_drive(&options).is_none());
    }
}
