use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use uom::si::length::centimeter;

use crate::{
    barricade::{Sweep, SweepStatus},
    clock::{Deadline, Instant, Monotonic},
    config::{ExitSampling, GateConfig, CLOSED_ANGLE},
    hc_sr04::{within_cm, HcSr04},
    ir::PresenceSensor,
    protocol::{emit, Command, Event, HostLink, LineBuffer},
    servo::AngularServo,
};

mod builder;

pub use builder::Builder;

pub fn builder() -> Builder<builder::NoEntry, builder::NoExit, builder::NoBarricade, builder::NoSlots>
{
    Builder::default()
}

/// One monitored parking space.
pub struct Slot<TRIGGER, ECHO> {
    label: &'static str,
    range_finder: HcSr04<TRIGGER, ECHO>,
}

impl<TRIGGER, ECHO> Slot<TRIGGER, ECHO> {
    pub fn new(label: &'static str, range_finder: HcSr04<TRIGGER, ECHO>) -> Self {
        Self {
            label,
            range_finder,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AfterSweep {
    Pacing,
    Scan,
}

/// Where the controller is within its loop. Phases holding a [`Deadline`]
/// block everything else until it passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Boot,
    Settling(Deadline),
    /// Top of the loop: sample both IR sensors.
    Sample,
    MotionHold(Deadline),
    Intake,
    /// Collecting a command line; the deadline is the idle timeout.
    Reading(Deadline),
    Sweeping {
        sweep: Sweep,
        then: AfterSweep,
    },
    Pacing(Deadline),
    ExitCheck,
    Scan(usize),
    SlotHold {
        until: Deadline,
        next: usize,
    },
}

enum Flow {
    /// Run the next phase in the same poll.
    Next(Phase),
    /// Stay here until polled again.
    Wait(Phase),
}

/// Single-lane gate controller.
///
/// Owns every pin, the host link and the clock. Drive it by calling
/// [`Gate::poll`] in a loop; it never blocks for longer than one range-finder
/// measurement.
pub struct Gate<ENTRY, EXIT, SERVO, TRIGGER, ECHO, LINK, CLOCK, DELAY, const N: usize> {
    entry: PresenceSensor<ENTRY>,
    exit: PresenceSensor<EXIT>,
    servo: SERVO,
    slots: [Slot<TRIGGER, ECHO>; N],

    link: LINK,
    clock: CLOCK,
    delay: DELAY,
    config: GateConfig,

    phase: Phase,
    line: LineBuffer,
    /// Exit level captured at the top of the current iteration.
    exit_at_start: bool,
    iterations: u32,
}

impl<ENTRY, EXIT, SERVO, TRIGGER, ECHO, LINK, CLOCK, DELAY, const N: usize>
    Gate<ENTRY, EXIT, SERVO, TRIGGER, ECHO, LINK, CLOCK, DELAY, N>
where
    ENTRY: InputPin,
    EXIT: InputPin,
    SERVO: AngularServo,
    TRIGGER: OutputPin,
    ECHO: InputPin<Error = TRIGGER::Error>,
    LINK: HostLink,
    CLOCK: Monotonic,
    DELAY: DelayNs,
{
    /// Advance the loop as far as it can go without waiting.
    ///
    /// Only errors writing to the host link are returned; sensor faults are
    /// logged and read as "nothing there".
    pub fn poll(&mut self) -> Result<(), LINK::Error> {
        loop {
            match self.step()? {
                Flow::Next(phase) => self.phase = phase,
                Flow::Wait(phase) => {
                    self.phase = phase;
                    return Ok(());
                }
            }
        }
    }

    /// When the controller next has work to do; `None` means right away.
    pub fn next_wake(&self) -> Option<Instant> {
        match self.phase {
            Phase::Settling(deadline)
            | Phase::MotionHold(deadline)
            | Phase::Reading(deadline)
            | Phase::Pacing(deadline)
            | Phase::SlotHold {
                until: deadline, ..
            } => Some(deadline.instant()),
            Phase::Sweeping { sweep, .. } => Some(sweep.wake().instant()),
            Phase::Boot | Phase::Sample | Phase::Intake | Phase::ExitCheck | Phase::Scan(_) => {
                None
            }
        }
    }

    pub fn is_sweeping(&self) -> bool {
        matches!(self.phase, Phase::Sweeping { .. })
    }

    /// Number of loop iterations started so far.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    fn step(&mut self) -> Result<Flow, LINK::Error> {
        let now = self.clock.now();
        let config = self.config;

        let flow = match self.phase {
            Phase::Boot => {
                log::info!("homing barricade");
                self.servo.set_angle(CLOSED_ANGLE);
                Flow::Next(Phase::Settling(Deadline::after(now, config.settle)))
            }
            Phase::Settling(until) => self.hold(until, now, Phase::Sample),
            Phase::Sample => {
                self.iterations = self.iterations.wrapping_add(1);
                let entry = self.entry.detected("entry");
                self.exit_at_start = self.exit.detected("exit");

                if entry {
                    log::info!("motion at entry, starting camera");
                    emit(&mut self.link, Event::MotionDetected)?;
                    emit(&mut self.link, Event::StartCamera)?;
                    Flow::Next(Phase::MotionHold(Deadline::after(now, config.motion_hold)))
                } else {
                    Flow::Next(Phase::Intake)
                }
            }
            Phase::MotionHold(until) => self.hold(until, now, Phase::Intake),
            Phase::Intake => match self.link.read_byte() {
                Ok(byte) => {
                    self.line.clear();
                    if self.line.push(byte) {
                        self.dispatch_line(now)?
                    } else {
                        Flow::Next(Phase::Reading(Deadline::after(now, config.serial_idle)))
                    }
                }
                Err(nb::Error::WouldBlock) => {
                    Flow::Next(Phase::Pacing(Deadline::after(now, config.pacing)))
                }
                Err(nb::Error::Other(e)) => return Err(e),
            },
            Phase::Reading(idle) => self.read_line(idle, now)?,
            Phase::Sweeping { sweep, then } => match sweep.poll(now, &mut self.servo) {
                SweepStatus::Moving(sweep) => Flow::Wait(Phase::Sweeping { sweep, then }),
                SweepStatus::Done => {
                    log::info!("barricade closed");
                    match then {
                        AfterSweep::Pacing => {
                            Flow::Next(Phase::Pacing(Deadline::after(now, config.pacing)))
                        }
                        AfterSweep::Scan => Flow::Next(Phase::Scan(0)),
                    }
                }
            },
            Phase::Pacing(until) => self.hold(until, now, Phase::ExitCheck),
            Phase::ExitCheck => {
                let exit = match config.exit_sampling {
                    ExitSampling::LoopStart => self.exit_at_start,
                    ExitSampling::BeforeUse => self.exit.detected("exit"),
                };

                if exit {
                    log::info!("vehicle leaving, opening barricade");
                    emit(&mut self.link, Event::ExitDetected)?;
                    emit(&mut self.link, Event::ExitOpening)?;
                    Flow::Next(Phase::Sweeping {
                        sweep: Sweep::start(now, config.sweep_step, config.open_hold),
                        then: AfterSweep::Scan,
                    })
                } else {
                    Flow::Next(Phase::Scan(0))
                }
            }
            Phase::Scan(index) => self.scan(index)?,
            Phase::SlotHold { until, next } => self.hold(until, now, Phase::Scan(next)),
        };

        Ok(flow)
    }

    fn hold(&self, until: Deadline, now: Instant, next: Phase) -> Flow {
        if until.expired(now) {
            Flow::Next(next)
        } else {
            Flow::Wait(self.phase)
        }
    }

    fn read_line(&mut self, mut idle: Deadline, now: Instant) -> Result<Flow, LINK::Error> {
        loop {
            match self.link.read_byte() {
                Ok(byte) => {
                    if self.line.push(byte) {
                        return self.dispatch_line(now);
                    }
                    idle = Deadline::after(now, self.config.serial_idle);
                }
                Err(nb::Error::WouldBlock) if idle.expired(now) => {
                    return self.dispatch_line(now);
                }
                Err(nb::Error::WouldBlock) => return Ok(Flow::Wait(Phase::Reading(idle))),
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
    }

    fn dispatch_line(&mut self, now: Instant) -> Result<Flow, LINK::Error> {
        let command = match self.line.line() {
            Ok(line) => {
                let command = Command::parse(line);
                if command.is_none() {
                    log::debug!("ignoring {:?}", line.trim());
                }
                command
            }
            Err(e) => {
                log::warn!("dropping inbound line: {:?}", e);
                None
            }
        };
        self.line.clear();

        let pacing = Phase::Pacing(Deadline::after(now, self.config.pacing));
        let next = match command {
            Some(Command::OpenBarricade) => {
                log::info!("registered vehicle, opening barricade");
                emit(&mut self.link, Event::OpeningBarricade)?;
                Phase::Sweeping {
                    sweep: Sweep::start(now, self.config.sweep_step, self.config.open_hold),
                    then: AfterSweep::Pacing,
                }
            }
            Some(Command::CloseBarricade) => {
                log::info!("unregistered vehicle, keeping barricade closed");
                emit(&mut self.link, Event::BarricadeStaysClosed)?;
                self.servo.set_angle(CLOSED_ANGLE);
                pacing
            }
            None => pacing,
        };

        Ok(Flow::Next(next))
    }

    fn scan(&mut self, index: usize) -> Result<Flow, LINK::Error> {
        let Some(slot) = self.slots.get_mut(index) else {
            // Iteration finished; let the caller breathe before the next one.
            return Ok(Flow::Wait(Phase::Sample));
        };

        let occupied = match slot
            .range_finder
            .measure_distance(&self.clock, &mut self.delay)
        {
            Ok(distance) => {
                log::debug!(
                    "slot {}: {} cm",
                    slot.label(),
                    distance.get::<centimeter>()
                );
                within_cm(
                    distance,
                    self.config.occupied_from_cm,
                    self.config.occupied_below_cm,
                )
            }
            Err(e) => {
                log::warn!("slot {}: no reading ({:?})", slot.label(), e);
                false
            }
        };

        if occupied {
            let label = slot.label();
            log::info!("slot {} occupied", label);
            emit(&mut self.link, Event::SlotOccupied(label))?;
            Ok(Flow::Next(Phase::SlotHold {
                until: Deadline::after(self.clock.now(), self.config.slot_hold),
                next: index + 1,
            }))
        } else {
            Ok(Flow::Next(Phase::Scan(index + 1)))
        }
    }
}
