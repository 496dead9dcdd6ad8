//! Interrupt-driven servo pulses on Timer1, after the Arduino `Servo` library.

use core::cell::RefCell;

use arduino_hal::{
    hal::port::Dynamic,
    pac::TC1,
    port::{mode::Output, Pin, PinOps},
};
use avr_device::interrupt::Mutex;
use heapless::Vec;
use vcell::VolatileCell;

use crate::servo::{
    pulse_width_us, AngularServo, DEFAULT_PULSE_WIDTH, MAX_PULSE_WIDTH, MIN_PULSE_WIDTH,
};

const MAX_SERVOS: usize = 12;
const REFRESH_INTERVAL: u32 = 20_000;
const CLOCK_CYCLES_PER_MICROSECOND: u32 = 16_000_000 / 1_000_000;

static SERVOS: Mutex<RefCell<Vec<ServoChannel, MAX_SERVOS>>> =
    Mutex::new(RefCell::new(Vec::new()));
static mut TC1: Option<TC1> = None;
static CHANNEL: Mutex<VolatileCell<i8>> = Mutex::new(VolatileCell::new(0));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServoError {
    /// [`donate_tc1`] has not been called yet.
    NotInitialized,
    TooManyServos,
}

struct ServoChannel {
    pin: Pin<Output>,
    ticks: VolatileCell<u16>,
    attached: bool,
}

#[derive(Debug)]
pub struct ServoAttached;
#[derive(Debug)]
pub struct ServoDetached;

#[derive(Debug)]
pub struct Servo<State> {
    index: usize,
    _phantom: core::marker::PhantomData<State>,
}

impl<State> Servo<State> {
    fn timer() -> Option<&'static TC1> {
        // Safety: only written by `donate_tc1`, before any servo exists
        unsafe { (*core::ptr::addr_of!(TC1)).as_ref() }
    }

    fn is_timer_active() -> bool {
        avr_device::interrupt::free(|cs| SERVOS.borrow(cs).borrow().iter().any(|s| s.attached))
    }
}

impl Servo<ServoDetached> {
    pub fn new<PIN: PinOps<Dynamic = Dynamic>>(pin: Pin<Output, PIN>) -> Result<Self, ServoError> {
        if Self::timer().is_none() {
            return Err(ServoError::NotInitialized);
        }
        avr_device::interrupt::free(|cs| {
            let mut servos = SERVOS.borrow(cs).borrow_mut();
            let index = servos.len();
            servos
                .push(ServoChannel {
                    pin: pin.downgrade(),
                    ticks: VolatileCell::new(us_to_ticks(DEFAULT_PULSE_WIDTH as u32) as u16),
                    attached: false,
                })
                .map_err(|_| ServoError::TooManyServos)?;
            Ok(Servo {
                index,
                _phantom: core::marker::PhantomData,
            })
        })
    }

    pub fn attach(self) -> Servo<ServoAttached> {
        if !Self::is_timer_active() {
            if let Some(tc1) = Self::timer() {
                tc1.tccr1a.write(|w| w.wgm1().bits(0));
                tc1.tccr1b.write(|w| w.cs1().prescale_8());
                tc1.tcnt1.write(|w| w.bits(0));
                // clear any pending compare match before enabling it
                tc1.tifr1.write(|w| w.ocf1a().set_bit());
                tc1.timsk1.write(|w| w.ocie1a().set_bit());
            }
        }
        avr_device::interrupt::free(|cs| {
            if let Some(servo) = SERVOS.borrow(cs).borrow_mut().get_mut(self.index) {
                servo.attached = true;
            }
        });
        Servo {
            index: self.index,
            _phantom: core::marker::PhantomData,
        }
    }
}

impl Servo<ServoAttached> {
    pub fn write_us(&self, us: i16) {
        let ticks = us_to_ticks(us.clamp(MIN_PULSE_WIDTH, MAX_PULSE_WIDTH) as u32) as u16;
        avr_device::interrupt::free(|cs| {
            if let Some(servo) = SERVOS.borrow(cs).borrow_mut().get_mut(self.index) {
                servo.ticks.set(ticks);
            }
        });
    }
}

impl AngularServo for Servo<ServoAttached> {
    fn set_angle(&mut self, degrees: u8) {
        self.write_us(pulse_width_us(degrees, MIN_PULSE_WIDTH, MAX_PULSE_WIDTH));
    }
}

/// Hand Timer1 over to the servo driver. Must happen before [`Servo::new`].
pub fn donate_tc1(tc1: TC1) {
    // Safety: no Servo can exist yet, so nothing reads TC1 concurrently
    unsafe {
        TC1 = Some(tc1);
    }
}

#[avr_device::interrupt(atmega328p)]
fn TIMER1_COMPA() {
    let Some(tc1) = Servo::<ServoAttached>::timer() else {
        return;
    };
    avr_device::interrupt::free(|cs| {
        let channel = CHANNEL.borrow(cs);
        let mut servos = SERVOS.borrow(cs).borrow_mut();
        if channel.get() < 0 {
            // refresh interval completed
            unsafe { tc1.tcnt1.write_with_zero(|w| w.bits(0)) };
        } else if let Some(servo) = servos.get_mut(channel.get() as usize) {
            if servo.attached {
                servo.pin.set_low();
            }
        }
        channel.set(channel.get() + 1);

        if let Some(servo) = servos.get_mut(channel.get() as usize) {
            tc1.ocr1a
                .write(|w| w.bits(tc1.tcnt1.read().bits() + servo.ticks.get()));
            if servo.attached {
                servo.pin.set_high();
            }
        } else {
            // all channels pulsed, wait out the rest of the frame
            let refresh = us_to_ticks(REFRESH_INTERVAL);
            if (tc1.tcnt1.read().bits() as u32) + 4 < refresh {
                tc1.ocr1a.write(|w| w.bits(refresh as u16));
            } else {
                tc1.ocr1a.write(|w| w.bits(tc1.tcnt1.read().bits() + 4));
            }
            channel.set(-1);
        }
    });
}

/// Assumes prescaler of 8
#[inline(always)]
fn us_to_ticks(us: u32) -> u32 {
    (us * CLOCK_CYCLES_PER_MICROSECOND) / 8
}
