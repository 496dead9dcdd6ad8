use core::{cell::RefCell, convert::Infallible};

use arduino_hal::{hal::usart::Event, pac::USART0};
use avr_device::interrupt::Mutex;
use heapless::Deque;
use ufmt::uWrite;

use super::Serial;
use crate::{config::LINE_CAPACITY, protocol::HostLink};

static RX: Mutex<RefCell<Deque<u8, LINE_CAPACITY>>> = Mutex::new(RefCell::new(Deque::new()));

/// USART0 with receive-complete interrupts feeding a byte queue, so the main
/// loop never blocks waiting for the host.
pub struct BufferedSerial {
    usart: Serial,
}

impl BufferedSerial {
    pub fn new(mut usart: Serial) -> Self {
        usart.listen(Event::RxComplete);
        Self { usart }
    }
}

impl uWrite for BufferedSerial {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.usart.write_str(s)
    }
}

impl HostLink for BufferedSerial {
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        avr_device::interrupt::free(|cs| RX.borrow(cs).borrow_mut().pop_front())
            .ok_or(nb::Error::WouldBlock)
    }
}

#[avr_device::interrupt(atmega328p)]
fn USART_RX() {
    // Safety: reading UDR0 only pops the receive register
    let byte = unsafe { (*USART0::ptr()).udr0.read().bits() };
    avr_device::interrupt::free(|cs| {
        // a full queue drops the byte; the line it belongs to is overlong anyway
        let _ = RX.borrow(cs).borrow_mut().push_back(byte);
    });
}
