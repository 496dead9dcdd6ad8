//! Test doubles that share one simulated microsecond clock.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};

use crate::{
    clock::{CtcSnapshot, Duration, Instant, Monotonic},
    protocol::HostLink,
    servo::AngularServo,
};

/// Time between the trigger falling edge and the echo rising edge.
pub const ECHO_LATENCY_US: u32 = 50;

#[derive(Clone, Default)]
pub struct SimTime(Rc<Cell<u32>>);

impl SimTime {
    pub fn now_us(&self) -> u32 {
        self.0.get()
    }

    pub fn advance_us(&self, us: u32) {
        self.0.set(self.0.get().wrapping_add(us));
    }

    pub fn set(&self, instant: Instant) {
        self.0.set(instant.ticks());
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_us(duration.ticks());
    }
}

impl Monotonic for SimTime {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.0.get())
    }
}

impl DelayNs for SimTime {
    fn delay_ns(&mut self, ns: u32) {
        self.advance_us(ns.div_ceil(1_000));
    }
}

/// Reads the shared clock through a Timer0-style snapshot: 25 µs compare
/// periods plus the 0.5 µs running count.
#[derive(Clone)]
pub struct TimerTime {
    time: SimTime,
    with_count: bool,
}

impl TimerTime {
    pub fn new(time: &SimTime) -> Self {
        Self {
            time: time.clone(),
            with_count: true,
        }
    }

    /// Only whole compare periods, as if the counter register were ignored.
    pub fn periods_only(time: &SimTime) -> Self {
        Self {
            time: time.clone(),
            with_count: false,
        }
    }
}

impl Monotonic for TimerTime {
    fn now(&self) -> Instant {
        let us = self.time.now_us();
        let snapshot = CtcSnapshot {
            periods: us / 25,
            count: if self.with_count { (us % 25 * 2) as u8 } else { 0 },
            match_pending: false,
        };
        Instant::from_ticks(snapshot.micros(49, 500))
    }
}

/// Digital input whose level the test sets through a shared handle.
#[derive(Clone)]
pub struct SimInput(Rc<Cell<bool>>);

impl SimInput {
    pub fn new(high: bool) -> Self {
        Self(Rc::new(Cell::new(high)))
    }

    pub fn set_high(&self, high: bool) {
        self.0.set(high);
    }
}

impl ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

/// Trigger side of a simulated HC-SR04; remembers the last falling edge.
pub struct SimTrigger {
    time: SimTime,
    high: bool,
    fell_at: Rc<Cell<Option<u32>>>,
}

impl ErrorType for SimTrigger {
    type Error = Infallible;
}

impl OutputPin for SimTrigger {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.fell_at.set(Some(self.time.now_us()));
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

/// Echo side of a simulated HC-SR04. Each read costs one microsecond.
pub struct SimEcho {
    time: SimTime,
    fell_at: Rc<Cell<Option<u32>>>,
    width_us: Rc<Cell<Option<u32>>>,
}

impl SimEcho {
    fn level(&self) -> bool {
        let now = self.time.now_us();
        self.time.advance_us(1);
        match (self.fell_at.get(), self.width_us.get()) {
            (Some(fell), Some(width)) => {
                let rise = fell + ECHO_LATENCY_US;
                now >= rise && now - rise < width
            }
            _ => false,
        }
    }
}

impl ErrorType for SimEcho {
    type Error = Infallible;
}

impl InputPin for SimEcho {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

/// Handle for changing what a simulated slot sensor sees.
#[derive(Clone)]
pub struct EchoControl(Rc<Cell<Option<u32>>>);

impl EchoControl {
    /// `None` means the echo never comes back.
    pub fn set_width_us(&self, width_us: Option<u32>) {
        self.0.set(width_us);
    }
}

pub fn ultrasonic_pair(time: &SimTime, width_us: Option<u32>) -> (SimTrigger, SimEcho) {
    let (trigger, echo, _) = ultrasonic_with_control(time, width_us);
    (trigger, echo)
}

pub fn ultrasonic_with_control(
    time: &SimTime,
    width_us: Option<u32>,
) -> (SimTrigger, SimEcho, EchoControl) {
    let fell_at = Rc::new(Cell::new(None));
    let width = Rc::new(Cell::new(width_us));
    let trigger = SimTrigger {
        time: time.clone(),
        high: false,
        fell_at: fell_at.clone(),
    };
    let echo = SimEcho {
        time: time.clone(),
        fell_at,
        width_us: width.clone(),
    };
    (trigger, echo, EchoControl(width))
}

/// Servo that records every commanded angle with the time it was written.
#[derive(Clone)]
pub struct SimServo {
    time: SimTime,
    writes: Rc<RefCell<Vec<(u32, u8)>>>,
}

impl SimServo {
    pub fn new(time: &SimTime) -> Self {
        Self {
            time: time.clone(),
            writes: Rc::default(),
        }
    }

    pub fn writes(&self) -> Vec<(u32, u8)> {
        self.writes.borrow().clone()
    }

    pub fn angles(&self) -> Vec<u8> {
        self.writes.borrow().iter().map(|&(_, angle)| angle).collect()
    }

    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }
}

impl AngularServo for SimServo {
    fn set_angle(&mut self, degrees: u8) {
        self.writes.borrow_mut().push((self.time.now_us(), degrees));
    }
}

/// In-memory serial link: the test queues inbound bytes and reads back
/// everything the controller wrote.
#[derive(Clone, Default)]
pub struct SimLink {
    rx: Rc<RefCell<VecDeque<u8>>>,
    tx: Rc<RefCell<String>>,
}

impl SimLink {
    pub fn send(&self, text: &str) {
        self.rx.borrow_mut().extend(text.bytes());
    }

    pub fn pending(&self) -> usize {
        self.rx.borrow().len()
    }

    pub fn take_output(&self) -> String {
        core::mem::take(&mut *self.tx.borrow_mut())
    }

    pub fn lines(&self) -> Vec<String> {
        self.take_output()
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    }
}

impl ufmt::uWrite for SimLink {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.tx.borrow_mut().push_str(s);
        Ok(())
    }
}

impl HostLink for SimLink {
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        self.rx.borrow_mut().pop_front().ok_or(nb::Error::WouldBlock)
    }
}
