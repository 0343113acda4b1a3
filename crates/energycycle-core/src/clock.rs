//! Time sources for the sampler.
//!
//! The sampler needs two clocks: a monotonic one for scheduling and energy
//! integration, and a wall clock for the timestamps written to the CSV. Both
//! come from one [`Clock`] so a test can substitute virtual time.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta};

/// Monotonic + wall-clock time source.
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock's origin.
    fn monotonic(&self) -> Duration;

    /// Current wall-clock time.
    fn wall(&self) -> DateTime<Local>;

    /// Suspend the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

// ---------------------------------------------------------------------------
// System clock
// ---------------------------------------------------------------------------

/// Real time: `Instant` for the monotonic side, local time for the wall side.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ---------------------------------------------------------------------------
// Manual clock
// ---------------------------------------------------------------------------

/// Virtual time that only moves when told to.
///
/// `sleep` returns immediately after advancing the clock, so a sampling loop
/// driven by a `ManualClock` runs as fast as the CPU allows while still seeing
/// a perfectly regular schedule. Use [`ManualClock::advance`] to simulate
/// time spent doing work (for example a slow sensor read).
#[derive(Debug)]
pub struct ManualClock {
    base: DateTime<Local>,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    /// A clock whose wall side reads `base` at monotonic zero.
    pub fn starting_at(base: DateTime<Local>) -> Self {
        Self {
            base,
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed = elapsed.saturating_add(by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wall(&self) -> DateTime<Local> {
        let elapsed = self.monotonic();
        let delta = TimeDelta::from_std(elapsed).unwrap_or_else(|_| TimeDelta::zero());
        self.base + delta
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic();
        clock.sleep(Duration::from_millis(2));
        let b = clock.monotonic();
        assert!(b > a);
    }

    #[test]
    fn test_manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        assert_eq!(clock.monotonic(), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(250));
        clock.advance(Duration::from_millis(50));
        assert_eq!(clock.monotonic(), Duration::from_millis(300));
    }

    #[test]
    fn test_manual_clock_wall_tracks_monotonic() {
        let clock = ManualClock::new();
        let before = clock.wall();
        clock.advance(Duration::from_secs(2));
        let after = clock.wall();
        assert_eq!((after - before).num_milliseconds(), 2000);
    }
}
