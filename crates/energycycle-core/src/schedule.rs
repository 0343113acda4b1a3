//! Fixed-cadence tick schedule with catch-up.

use std::time::Duration;

use crate::clock::Clock;

/// Smallest accepted sampling interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Clamp `interval` to [`MIN_INTERVAL`].
pub fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        log::warn!(
            "sampling interval {:.3}s below minimum, using {:.3}s",
            interval.as_secs_f64(),
            MIN_INTERVAL.as_secs_f64()
        );
        MIN_INTERVAL
    } else {
        interval
    }
}

/// Target times for successive ticks.
///
/// The next target always advances by exactly one interval from the previous
/// *target*, so a late tick never shifts the rest of the schedule. When a
/// tick overruns, [`TickSchedule::wait`] returns immediately until the
/// schedule has caught up.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    interval: Duration,
    next_tick: Duration,
}

impl TickSchedule {
    /// A schedule whose first tick is due at `start`.
    pub fn new(start: Duration, interval: Duration) -> Self {
        Self {
            interval: clamp_interval(interval),
            next_tick: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_tick(&self) -> Duration {
        self.next_tick
    }

    /// Time left until the next tick, or `None` if it is already due.
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        (now < self.next_tick).then(|| self.next_tick - now)
    }

    /// Sleep on `clock` until the next tick is due.
    pub fn wait(&self, clock: &dyn Clock) {
        if let Some(delay) = self.remaining(clock.monotonic()) {
            clock.sleep(delay);
        }
    }

    /// Move the target forward by one interval.
    pub fn advance(&mut self) {
        self.next_tick = self.next_tick.saturating_add(self.interval);
    }
}
