use crate::clock::Duration;

pub const BAUD_RATE: u32 = 9600;

pub const SLOT_COUNT: usize = 2;
pub const SLOT_LABELS: [&str; SLOT_COUNT] = ["101", "102"];

pub const CLOSED_ANGLE: u8 = 0;
pub const OPEN_ANGLE: u8 = 90;

/// Longest inbound command line we keep; anything longer is dropped.
pub const LINE_CAPACITY: usize = 64;

/// Which exit-sensor level the exit step acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitSampling {
    /// Level captured at the top of the iteration, before command intake
    /// and pacing. Can be more than a second stale when acted on.
    LoopStart,
    /// Sensor is read again right before the exit step.
    BeforeUse,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateConfig {
    /// Pause after homing the servo at startup.
    pub settle: Duration,
    /// Pause after reporting motion at the entry.
    pub motion_hold: Duration,
    /// Fixed pause after command intake.
    pub pacing: Duration,
    /// Time spent on each degree of the sweep.
    pub sweep_step: Duration,
    /// Time the barricade stays fully open.
    pub open_hold: Duration,
    /// Pause after reporting an occupied slot.
    pub slot_hold: Duration,
    /// A command line ends once the link stays quiet this long.
    pub serial_idle: Duration,
    pub exit_sampling: ExitSampling,
    /// Occupancy band `[from, below)` in centimeters.
    pub occupied_from_cm: f32,
    pub occupied_below_cm: f32,
}

impl GateConfig {
    pub const DEFAULT: Self = Self {
        settle: Duration::secs(1),
        motion_hold: Duration::secs(5),
        pacing: Duration::secs(1),
        sweep_step: Duration::millis(100),
        open_hold: Duration::secs(5),
        slot_hold: Duration::secs(5),
        serial_idle: Duration::secs(1),
        exit_sampling: ExitSampling::BeforeUse,
        occupied_from_cm: 1.0,
        occupied_below_cm: 5.0,
    };

    pub const fn with_exit_sampling(self, exit_sampling: ExitSampling) -> Self {
        Self {
            exit_sampling,
            ..self
        }
    }

    pub const fn with_serial_idle(self, serial_idle: Duration) -> Self {
        Self {
            serial_idle,
            ..self
        }
    }

    /// Nominal length of one open/close sweep.
    pub fn sweep_duration(&self) -> Duration {
        let steps = 2 * (OPEN_ANGLE - CLOSED_ANGLE) as u32 + 2;
        self.sweep_step * steps + self.open_hold
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
