//! ATmega328P (Arduino Nano) implementations of the controller's seams.

use arduino_hal::{
    hal::port::{PD0, PD1},
    pac::USART0,
    port::{
        mode::{Input, Output},
        Pin,
    },
    Usart,
};

pub mod clock;
pub mod serial;
pub mod servo;

pub type Serial = Usart<USART0, Pin<Input, PD0>, Pin<Output, PD1>>;
