// Motor-safety watchdog for the drivetrain
//
// The drivetrain must be fed every control cycle. If feeding stops for longer
// than the expiration, the timer reports the drivetrain as not alive;
// runtime::drive_cycle then disables the motors before resuming control.

use std::time::{Duration, Instant};

use tracing::warn;

/// Liveness signal fed once per control cycle
pub trait Watchdog {
    fn feed(&mut self);

    fn is_alive(&self) -> bool;
}

/// Expiration-based safety timer
#[derive(Debug, Clone)]
pub struct SafetyTimer {
    expiration: Duration,
    last_fed: Option<Instant>,
}

impl SafetyTimer {
    /// A timer that is not alive until first fed
    pub fn new(expiration: Duration) -> Self {
        Self {
            expiration,
            last_fed: None,
        }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Time since the last feed, if ever fed
    pub fn since_fed(&self) -> Option<Duration> {
        self.last_fed.map(|at| at.elapsed())
    }
}

impl Watchdog for SafetyTimer {
    fn feed(&mut self) {
        if let Some(age) = self.since_fed() {
            if age > self.expiration {
                warn!("Drive watchdog fed {:?} late", age - self.expiration);
            }
        }
        self.last_fed = Some(Instant::now());
    }

    fn is_alive(&self) -> bool {
        matches!(self.since_fed(), Some(age) if age <= self.expiration)
    }
}
