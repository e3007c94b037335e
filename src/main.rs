use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use ramped_drive_runtime::config::{ActuatorTuning, ChassisGeometry};
use ramped_drive_runtime::motor::{ControlMode, DriveMode};
use ramped_drive_runtime::runtime::{self, RuntimeOptions};

/// Control mode the drive motor controllers are put in
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ControlModeArg {
    Percent,
    Velocity,
    Position,
}

impl From<ControlModeArg> for ControlMode {
    fn from(arg: ControlModeArg) -> Self {
        match arg {
            ControlModeArg::Percent => ControlMode::PercentOutput,
            ControlModeArg::Velocity => ControlMode::Velocity,
            ControlModeArg::Position => ControlMode::Position,
        }
    }
}

/// Drive a four-wheel base from JSON operator input on stdin
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, value_enum, default_value = "tank-like-mix")]
    mode: DriveMode,

    #[arg(long, value_enum, default_value = "percent")]
    control_mode: ControlModeArg,

    /// Velocity ramp fraction per cycle, in (0, 1]
    #[arg(long)]
    ramp: Option<f32>,

    #[arg(long)]
    max_velocity: Option<f32>,

    #[arg(long)]
    max_acceleration: Option<f32>,

    #[arg(long)]
    wheel_base: Option<f32>,

    #[arg(long)]
    wheel_track: Option<f32>,

    /// Device ids to simulate as not responding (repeatable)
    #[arg(long = "offline")]
    offline: Vec<u8>,
}

impl Args {
    fn into_options(self) -> RuntimeOptions {
        let defaults = ActuatorTuning::default();
        let tuning = ActuatorTuning {
            ramp: self.ramp.unwrap_or(defaults.ramp),
            max_velocity: self.max_velocity.unwrap_or(defaults.max_velocity),
            max_acceleration: self.max_acceleration.unwrap_or(defaults.max_acceleration),
            ..defaults
        };
        let chassis = ChassisGeometry::default();
        let geometry = ChassisGeometry {
            wheel_base: self.wheel_base.unwrap_or(chassis.wheel_base),
            wheel_track: self.wheel_track.unwrap_or(chassis.wheel_track),
            ..chassis
        };
        RuntimeOptions {
            drive_mode: self.mode,
            control_mode: self.control_mode.into(),
            tuning,
            geometry,
            offline_devices: self.offline,
        }
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let options = Args::parse().into_options();
    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
