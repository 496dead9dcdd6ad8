//! Text protocol spoken with the host over the serial line.
//!
//! Every outbound message is one line terminated by `\r\n`. Inbound, the host
//! sends one of two commands; anything else is ignored.

use heapless::Vec;
use ufmt::{uDisplay, uWrite, Formatter};

use crate::config::LINE_CAPACITY;

pub const OPEN_BARRICADE: &str = "OPEN_BARRICADE";
pub const CLOSE_BARRICADE: &str = "CLOSE_BARRICADE";
pub const SLOT_OCCUPIED_PREFIX: &str = "SLOT_OCCUPIED:";

/// Byte-oriented serial link to the host.
pub trait HostLink: uWrite {
    /// Next received byte, or `WouldBlock` if none is buffered.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    OpenBarricade,
    CloseBarricade,
}

impl Command {
    /// Exact, case-sensitive match after trimming surrounding ASCII
    /// whitespace.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim_matches(|c: char| c.is_ascii_whitespace()) {
            OPEN_BARRICADE => Some(Command::OpenBarricade),
            CLOSE_BARRICADE => Some(Command::CloseBarricade),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    MotionDetected,
    StartCamera,
    OpeningBarricade,
    BarricadeStaysClosed,
    ExitDetected,
    /// Exit marker. Same literal as the inbound open command.
    ExitOpening,
    SlotOccupied(&'a str),
}

impl uDisplay for Event<'_> {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match self {
            Event::MotionDetected => f.write_str("Motion detected"),
            Event::StartCamera => f.write_str("START_CAMERA"),
            Event::OpeningBarricade => f.write_str("Registered vehicle. Opening Barricade."),
            Event::BarricadeStaysClosed => {
                f.write_str("Unregistered vehicle. Barricade remains closed.")
            }
            Event::ExitDetected => f.write_str("Exit detected"),
            Event::ExitOpening => f.write_str(OPEN_BARRICADE),
            Event::SlotOccupied(label) => {
                f.write_str(SLOT_OCCUPIED_PREFIX)?;
                f.write_str(label)
            }
        }
    }
}

/// Write `event` as one protocol line.
pub fn emit<W: uWrite + ?Sized>(link: &mut W, event: Event<'_>) -> Result<(), W::Error> {
    ufmt::uwrite!(link, "{}\r\n", event)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineError {
    /// More than `LINE_CAPACITY` bytes before the line ended.
    Overflow,
    NotUtf8,
}

/// Accumulates one inbound line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    bytes: Vec<u8, LINE_CAPACITY>,
    overflowed: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            overflowed: false,
        }
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.overflowed = false;
    }

    /// Append a byte; returns `true` once the byte ends the line.
    pub fn push(&mut self, byte: u8) -> bool {
        if byte == b'\n' {
            return true;
        }
        if self.bytes.push(byte).is_err() {
            self.overflowed = true;
        }
        false
    }

    pub fn line(&self) -> Result<&str, LineError> {
        if self.overflowed {
            return Err(LineError::Overflow);
        }
        core::str::from_utf8(&self.bytes).map_err(|_| LineError::NotUtf8)
    }
}
