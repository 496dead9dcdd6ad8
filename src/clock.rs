/// Ticks are microseconds; a `u32` counter wraps after ~71 minutes, which
/// `fugit` comparisons tolerate as long as deadlines stay within half of that.
pub const TICK_HZ: u32 = 1_000_000;

pub type Instant = fugit::TimerInstantU32<TICK_HZ>;
pub type Duration = fugit::TimerDurationU32<TICK_HZ>;

/// Source of monotonic time for the controller and the range finders.
pub trait Monotonic {
    fn now(&self) -> Instant;

    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now()
            .checked_duration_since(earlier)
            .unwrap_or(Duration::from_ticks(0))
    }
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Point in time a waiting phase may move on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn after(now: Instant, wait: Duration) -> Self {
        Self(now + wait)
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.0
    }

    pub fn instant(&self) -> Instant {
        self.0
    }
}

/// Reading of a hardware timer running in clear-on-compare mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CtcSnapshot {
    /// Compare matches already counted by the interrupt.
    pub periods: u32,
    /// Timer counter register.
    pub count: u8,
    /// A compare match fired but its interrupt has not run yet.
    pub match_pending: bool,
}

impl CtcSnapshot {
    /// Microseconds since the timer started. The counter restarts at 0 after
    /// reaching `top`, and each count lasts `ns_per_count` nanoseconds.
    pub fn micros(&self, top: u8, ns_per_count: u32) -> u32 {
        let mut periods = self.periods;
        // counter already restarted, the period it finished is not counted yet
        if self.match_pending && self.count < top {
            periods = periods.wrapping_add(1);
        }
        let us_per_period = (top as u32 + 1) * ns_per_count / 1_000;
        periods
            .wrapping_mul(us_per_period)
            .wrapping_add(self.count as u32 * ns_per_count / 1_000)
    }
}
