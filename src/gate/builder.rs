use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::{
    clock::Monotonic,
    config::GateConfig,
    ir::PresenceSensor,
    protocol::{HostLink, LineBuffer},
    servo::AngularServo,
};

use super::{Gate, Phase, Slot};

#[derive(Default)]
pub struct NoEntry;
pub struct Entry<P>(PresenceSensor<P>);

#[derive(Default)]
pub struct NoExit;
pub struct Exit<P>(PresenceSensor<P>);

#[derive(Default)]
pub struct NoBarricade;
pub struct Barricade<S>(S);

#[derive(Default)]
pub struct NoSlots;
pub struct Slots<TRIGGER, ECHO, const N: usize>([Slot<TRIGGER, ECHO>; N]);

/// Collects every pin the gate needs; [`Builder::build`] only exists once
/// all of them have been handed over.
#[derive(Default)]
pub struct Builder<EN, EX, B, S> {
    entry: EN,
    exit: EX,
    barricade: B,
    slots: S,
}

impl<EX, B, S> Builder<NoEntry, EX, B, S> {
    pub fn entry<P: InputPin>(self, pin: P) -> Builder<Entry<P>, EX, B, S> {
        let Self {
            exit,
            barricade,
            slots,
            ..
        } = self;

        Builder {
            entry: Entry(PresenceSensor::new(pin)),
            exit,
            barricade,
            slots,
        }
    }
}

impl<EN, B, S> Builder<EN, NoExit, B, S> {
    pub fn exit<P: InputPin>(self, pin: P) -> Builder<EN, Exit<P>, B, S> {
        let Self {
            entry,
            barricade,
            slots,
            ..
        } = self;

        Builder {
            entry,
            exit: Exit(PresenceSensor::new(pin)),
            barricade,
            slots,
        }
    }
}

impl<EN, EX, S> Builder<EN, EX, NoBarricade, S> {
    pub fn barricade<SERVO: AngularServo>(
        self,
        servo: SERVO,
    ) -> Builder<EN, EX, Barricade<SERVO>, S> {
        let Self {
            entry, exit, slots, ..
        } = self;

        Builder {
            entry,
            exit,
            barricade: Barricade(servo),
            slots,
        }
    }
}

impl<EN, EX, B> Builder<EN, EX, B, NoSlots> {
    pub fn slots<TRIGGER, ECHO, const N: usize>(
        self,
        slots: [Slot<TRIGGER, ECHO>; N],
    ) -> Builder<EN, EX, B, Slots<TRIGGER, ECHO, N>>
    where
        TRIGGER: OutputPin,
        ECHO: InputPin<Error = TRIGGER::Error>,
    {
        let Self {
            entry,
            exit,
            barricade,
            ..
        } = self;

        Builder {
            entry,
            exit,
            barricade,
            slots: Slots(slots),
        }
    }
}

impl<ENTRY, EXIT, SERVO, TRIGGER, ECHO, const N: usize>
    Builder<Entry<ENTRY>, Exit<EXIT>, Barricade<SERVO>, Slots<TRIGGER, ECHO, N>>
{
    /// Hand over the host link and time sources. Nothing touches the pins
    /// until the first [`Gate::poll`].
    pub fn build<LINK, CLOCK, DELAY>(
        self,
        link: LINK,
        clock: CLOCK,
        delay: DELAY,
        config: GateConfig,
    ) -> Gate<ENTRY, EXIT, SERVO, TRIGGER, ECHO, LINK, CLOCK, DELAY, N>
    where
        LINK: HostLink,
        CLOCK: Monotonic,
        DELAY: DelayNs,
    {
        Gate {
            entry: self.entry.0,
            exit: self.exit.0,
            servo: self.barricade.0,
            slots: self.slots.0,

            link,
            clock,
            delay,
            config,

            phase: Phase::Boot,
            line: LineBuffer::new(),
            exit_at_start: false,
            iterations: 0,
        }
    }
}
