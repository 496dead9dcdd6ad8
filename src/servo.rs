/// Hobby servo positioned by angle.
pub trait AngularServo {
    /// Command the horn to `degrees` (0..=180). Returns immediately; the
    /// servo gets there on its own.
    fn set_angle(&mut self, degrees: u8);
}

impl<S: AngularServo + ?Sized> AngularServo for &mut S {
    fn set_angle(&mut self, degrees: u8) {
        (**self).set_angle(degrees)
    }
}

pub const MAX_ANGLE: u8 = 180;
pub const MIN_PULSE_WIDTH: i16 = 544;
pub const MAX_PULSE_WIDTH: i16 = 2400;
pub const DEFAULT_PULSE_WIDTH: u16 = 1500;

/// Pulse width in microseconds for `degrees`, within `[min_us, max_us]`.
pub fn pulse_width_us(degrees: u8, min_us: i16, max_us: i16) -> i16 {
    let degrees = degrees.min(MAX_ANGLE);
    map(degrees as i16, 0, MAX_ANGLE as i16, min_us, max_us).clamp(min_us, max_us)
}

/// Re-maps a number from one range to another.
/// That is, a value of fromLow would get mapped to toLow,
/// a value of fromHigh to toHigh, values in-between to values in-between, etc.
pub fn map(value: i16, from_low: i16, from_high: i16, to_low: i16, to_high: i16) -> i16 {
    let scaled = (value as i32 - from_low as i32) * (to_high as i32 - to_low as i32)
        / (from_high as i32 - from_low as i32);
    (scaled + to_low as i32) as i16
}
