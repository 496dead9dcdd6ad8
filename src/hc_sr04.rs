use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use uom::si::{
    f32::{Length, TemperatureInterval, Time, Velocity},
    length::centimeter,
    temperature_interval::degree_celsius,
    time::microsecond,
    velocity::meter_per_second,
};

use crate::clock::{Duration, Monotonic};

/// An echo longer than this is past the sensor's 4 m range.
pub const ECHO_TIMEOUT: Duration = Duration::millis(30);

/// 0.034 cm/µs
const DEFAULT_SPEED_OF_SOUND: f32 = 340.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HcSr04Error<E> {
    Pin(E),
    /// Echo line never went high after the trigger pulse.
    NoEcho,
    /// Echo line went high and never came back down.
    EchoTimeout,
    InvalidResult,
}

impl<E> From<E> for HcSr04Error<E> {
    fn from(e: E) -> Self {
        HcSr04Error::Pin(e)
    }
}

pub struct HcSr04<TRIGGER, ECHO> {
    trigger: TRIGGER,
    echo: ECHO,

    /// Low time before the trigger pulse, in microseconds.
    settle_time: u32,
    /// Trigger pulse width, in microseconds.
    trigger_time: u32,
    timeout: Duration,
    speed_of_sound: Velocity,
}

impl<TRIGGER, ECHO, E> HcSr04<TRIGGER, ECHO>
where
    TRIGGER: OutputPin<Error = E>,
    ECHO: InputPin<Error = E>,
{
    pub fn new(trigger: TRIGGER, echo: ECHO) -> Self {
        Self {
            trigger,
            echo,

            settle_time: 2,
            trigger_time: 10,
            timeout: ECHO_TIMEOUT,
            speed_of_sound: Velocity::new::<meter_per_second>(DEFAULT_SPEED_OF_SOUND),
        }
    }

    /// Compensate the speed of sound for the air temperature.
    pub fn with_air_temperature(mut self, temperature: TemperatureInterval) -> Self {
        let celsius = temperature.get::<degree_celsius>();
        self.speed_of_sound = Velocity::new::<meter_per_second>(331.3 + 0.606 * celsius);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn measure_distance<C, D>(
        &mut self,
        clock: &C,
        delay: &mut D,
    ) -> Result<Length, HcSr04Error<E>>
    where
        C: Monotonic,
        D: DelayNs,
    {
        let echo = self.measure_us(clock, delay)?;
        Ok(self.distance(echo))
    }

    /// Fire one trigger pulse and time the echo pulse.
    pub fn measure_us<C, D>(
        &mut self,
        clock: &C,
        delay: &mut D,
    ) -> Result<Duration, HcSr04Error<E>>
    where
        C: Monotonic,
        D: DelayNs,
    {
        // Ensure trigger pin is low
        self.trigger.set_low()?;
        delay.delay_us(self.settle_time);

        // Hold trigger pin high for 10 microseconds, which signals
        // the sensor to measure distance
        self.trigger.set_high()?;
        delay.delay_us(self.trigger_time);
        self.trigger.set_low()?;

        let armed = clock.now();
        while self.echo.is_low()? {
            if clock.elapsed_since(armed) > self.timeout {
                return Err(HcSr04Error::NoEcho);
            }
        }

        let rise = clock.now();
        while self.echo.is_high()? {
            if clock.elapsed_since(rise) > self.timeout {
                return Err(HcSr04Error::EchoTimeout);
            }
        }

        clock
            .now()
            .checked_duration_since(rise)
            .ok_or(HcSr04Error::InvalidResult)
    }

    /// Sound travels to the obstacle and back, so halve the path.
    pub fn distance(&self, echo: Duration) -> Length {
        let time = Time::new::<microsecond>(echo.ticks() as f32);
        self.speed_of_sound * time / 2.0
    }

    pub fn release(self) -> (TRIGGER, ECHO) {
        (self.trigger, self.echo)
    }
}

/// `true` when `distance` falls in `[from_cm, below_cm)`.
pub fn within_cm(distance: Length, from_cm: f32, below_cm: f32) -> bool {
    let cm = distance.get::<centimeter>();
    cm >= from_cm && cm < below_cm
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    use super::*;
    use crate::sim::{SimEcho, SimTime, TimerTime};

    fn sensor(time: &SimTime, width_us: Option<u32>) -> HcSr04<crate::sim::SimTrigger, SimEcho> {
        let (trigger, echo) = crate::sim::ultrasonic_pair(time, width_us);
        HcSr04::new(trigger, echo)
    }

    #[test]
    fn trigger_pulse_then_echo_read() {
        let trigger = PinMock::new(&[
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
        ]);
        let echo = PinMock::new(&[
            Transaction::get(State::High),
            Transaction::get(State::Low),
        ]);
        let time = SimTime::default();
        let mut delay = time.clone();
        let mut hc_sr04 = HcSr04::new(trigger, echo);

        let width = hc_sr04.measure_us(&time, &mut delay).unwrap();
        assert_eq!(width, Duration::micros(0));
        // 2 µs low + 10 µs high
        assert_eq!(time.now_us(), 12);

        let (mut trigger, mut echo) = hc_sr04.release();
        trigger.done();
        echo.done();
    }

    #[test]
    fn echo_width_converts_to_centimeters() {
        let time = SimTime::default();
        let mut delay = time.clone();
        let mut hc_sr04 = sensor(&time, Some(294));

        let distance = hc_sr04.measure_distance(&time, &mut delay).unwrap();
        let cm = distance.get::<centimeter>();
        assert!((cm - 4.998).abs() < 0.05, "got {cm} cm");
    }

    fn classify(clock_for: fn(&SimTime) -> TimerTime, width_us: u32, start_us: u32) -> bool {
        let time = SimTime::default();
        time.advance_us(start_us);
        let clock = clock_for(&time);
        let mut delay = time.clone();
        let mut hc_sr04 = sensor(&time, Some(width_us));

        let distance = hc_sr04.measure_distance(&clock, &mut delay).unwrap();
        within_cm(distance, 1.0, 5.0)
    }

    #[test]
    fn band_edge_echoes_hold_at_every_timer_phase() {
        // 4.93 cm and 1.19 cm
        for width_us in [290, 70] {
            for start_us in 0..25 {
                assert!(
                    classify(TimerTime::new, width_us, start_us),
                    "{width_us} µs echo starting at {start_us} µs"
                );
            }
        }
    }

    #[test]
    fn whole_timer_periods_misplace_band_edges() {
        for width_us in [290, 70] {
            let missed = (0..25)
                .filter(|&start_us| !classify(TimerTime::periods_only, width_us, start_us))
                .count();
            assert!(missed > 0, "{width_us} µs echo never misread");
        }
    }

    #[test]
    fn occupancy_band_is_half_open() {
        let time = SimTime::default();
        let hc_sr04 = sensor(&time, None);

        let inside = |us| within_cm(hc_sr04.distance(Duration::micros(us)), 1.0, 5.0);
        assert!(!inside(0));
        assert!(!inside(58)); // 0.99 cm
        assert!(inside(59)); // 1.00 cm
        assert!(inside(147)); // 2.50 cm
        assert!(inside(294)); // 4.998 cm
        assert!(!inside(295)); // 5.015 cm
        assert!(!inside(5_800)); // ~1 m
    }

    #[test]
    fn warmer_air_reads_farther() {
        let time = SimTime::default();
        let warm = sensor(&time, None)
            .with_air_temperature(TemperatureInterval::new::<degree_celsius>(35.0));
        let cold = sensor(&time, None)
            .with_air_temperature(TemperatureInterval::new::<degree_celsius>(0.0));

        let echo = Duration::micros(1_000);
        assert!(warm.distance(echo) > cold.distance(echo));
        let cm = cold.distance(echo).get::<centimeter>();
        assert!((cm - 16.565).abs() < 0.01, "got {cm} cm");
    }

    #[test]
    fn missing_echo_times_out() {
        let time = SimTime::default();
        let mut delay = time.clone();
        let mut hc_sr04 = sensor(&time, None);

        let result = hc_sr04.measure_us(&time, &mut delay);
        assert_eq!(result, Err(HcSr04Error::NoEcho));
        assert!(time.now_us() > ECHO_TIMEOUT.ticks());
        assert!(time.now_us() < ECHO_TIMEOUT.ticks() + 100);
    }

    #[test]
    fn stuck_echo_times_out() {
        let time = SimTime::default();
        let mut delay = time.clone();
        let mut hc_sr04 = sensor(&time, Some(u32::MAX / 4)).with_timeout(Duration::millis(5));

        let result = hc_sr04.measure_us(&time, &mut delay);
        assert_eq!(result, Err(HcSr04Error::EchoTimeout));
    }
}
