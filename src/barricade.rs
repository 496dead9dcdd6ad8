use crate::{
    clock::{Deadline, Duration, Instant},
    config::{CLOSED_ANGLE, OPEN_ANGLE},
    servo::AngularServo,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Opening(u8),
    Holding,
    Closing(u8),
    Closed,
}

/// One open, hold, close cycle of the barricade arm.
///
/// Every degree on the way up and down gets its own `step` before the next
/// one is written; after the last upward step the arm is held open for
/// `hold`. The sweep ends one `step` after the arm is written back to
/// [`CLOSED_ANGLE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sweep {
    stage: Stage,
    wake: Deadline,
    step: Duration,
    hold: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepStatus {
    Moving(Sweep),
    Done,
}

impl Sweep {
    pub fn start(now: Instant, step: Duration, hold: Duration) -> Self {
        Self {
            stage: Stage::Opening(CLOSED_ANGLE),
            wake: Deadline::at(now),
            step,
            hold,
        }
    }

    /// When the sweep next needs attention.
    pub fn wake(&self) -> Deadline {
        self.wake
    }

    pub fn poll<S: AngularServo>(mut self, now: Instant, servo: &mut S) -> SweepStatus {
        while self.wake.expired(now) {
            match self.stage {
                Stage::Opening(angle) => {
                    servo.set_angle(angle);
                    self.wake = Deadline::after(now, self.step);
                    self.stage = if angle >= OPEN_ANGLE {
                        Stage::Holding
                    } else {
                        Stage::Opening(angle + 1)
                    };
                }
                Stage::Holding => {
                    log::debug!("barricade held open");
                    self.wake = Deadline::after(now, self.hold);
                    self.stage = Stage::Closing(OPEN_ANGLE);
                }
                Stage::Closing(angle) => {
                    servo.set_angle(angle);
                    self.wake = Deadline::after(now, self.step);
                    self.stage = if angle <= CLOSED_ANGLE {
                        Stage::Closed
                    } else {
                        Stage::Closing(angle - 1)
                    };
                }
                Stage::Closed => return SweepStatus::Done,
            }
        }
        SweepStatus::Moving(self)
    }
}
