//! Running energy integral.

use std::time::Duration;

use crate::sensor::Reading;

/// Cumulative energy over a stream of readings.
///
/// Each reading is integrated as `power × dt`, where `dt` is the real time
/// since the previous reading (taken from when each reading actually fired,
/// not when it was scheduled). The first reading has `dt = 0`. Readings
/// without power still advance the previous-sample time but add nothing.
#[derive(Debug, Clone, Default)]
pub struct EnergyAccumulator {
    total_j: f64,
    previous: Option<Duration>,
}

/// What one call to [`EnergyAccumulator::integrate`] produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub dt: Duration,
    pub power: Option<f64>,
    /// Cumulative energy after this step.
    pub total_j: f64,
}

impl EnergyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate a reading captured at monotonic time `at`.
    pub fn integrate(&mut self, at: Duration, reading: &Reading) -> Step {
        let dt = match self.previous {
            Some(prev) => at.saturating_sub(prev),
            None => Duration::ZERO,
        };
        self.previous = Some(at);

        let power = reading.power();
        if let Some(p) = power {
            self.total_j += p * dt.as_secs_f64();
        }

        Step {
            dt,
            power,
            total_j: self.total_j,
        }
    }

    /// Energy so far in joules.
    pub fn total_j(&self) -> f64 {
        self.total_j
    }

    /// Energy so far in watt-hours.
    pub fn total_wh(&self) -> f64 {
        self.total_j / 3600.0
    }
}
