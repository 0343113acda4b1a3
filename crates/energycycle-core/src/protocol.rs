//! Rest/stress phase controller.
//!
//! For every level the controller runs a rest phase at 0% followed by a
//! stress phase at the level, bracketing each phase with marker rows:
//!
//! ```text
//! START_PROTOCOL
//! REST_BEGIN_<L>  ... REST_END_<L>
//! STRESS_<L>_BEGIN ... STRESS_<L>_END
//! ...
//! END_PROTOCOL
//! ```
//!
//! A failing phase aborts the remaining levels. `END_PROTOCOL` is still
//! written and the recorder is always stopped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::levels::DEFAULT_LEVELS;
use crate::loadgen::LoadGenerator;
use crate::recorder::Recorder;
use crate::summary::SessionSummary;

pub const START_MARKER: &str = "START_PROTOCOL";
pub const END_MARKER: &str = "END_PROTOCOL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Rest,
    Stress,
}

impl Phase {
    /// Load held during this phase of `level`.
    pub fn load(self, level: u32) -> u32 {
        match self {
            Phase::Rest => 0,
            Phase::Stress => level,
        }
    }

    pub fn begin_marker(self, level: u32) -> String {
        match self {
            Phase::Rest => format!("REST_BEGIN_{level}"),
            Phase::Stress => format!("STRESS_{level}_BEGIN"),
        }
    }

    pub fn end_marker(self, level: u32) -> String {
        match self {
            Phase::Rest => format!("REST_END_{level}"),
            Phase::Stress => format!("STRESS_{level}_END"),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Rest => write!(f, "rest"),
            Phase::Stress => write!(f, "stress"),
        }
    }
}

/// Protocol parameters.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub levels: Vec<u32>,
    pub rest: Duration,
    pub stress: Duration,
    pub cpu_workers: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
            rest: Duration::from_secs(20),
            stress: Duration::from_secs(80),
            cpu_workers: 1,
        }
    }
}

impl ProtocolConfig {
    fn duration(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Rest => self.rest,
            Phase::Stress => self.stress,
        }
    }

    /// Wall time the full protocol should take.
    pub fn expected_duration(&self) -> Duration {
        let levels = u32::try_from(self.levels.len()).unwrap_or(u32::MAX);
        self.rest.saturating_add(self.stress).saturating_mul(levels)
    }
}

/// Outcome of [`PhaseController::run`].
#[derive(Debug)]
pub struct ProtocolReport {
    /// Levels whose rest and stress phases both completed.
    pub completed_levels: Vec<u32>,
    pub summary: Option<SessionSummary>,
    /// First error encountered, if any.
    pub error: Option<Error>,
}

impl ProtocolReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn was_interrupted(&self) -> bool {
        matches!(self.error, Some(Error::Interrupted))
    }

    /// The summary on success, the first error otherwise.
    pub fn into_result(self) -> Result<Option<SessionSummary>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.summary),
        }
    }
}

/// Drives a [`LoadGenerator`] through the protocol while a [`Recorder`]
/// captures it.
pub struct PhaseController {
    generator: Box<dyn LoadGenerator>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl PhaseController {
    pub fn new(generator: Box<dyn LoadGenerator>) -> Self {
        Self {
            generator,
            interrupt: None,
        }
    }

    /// Abort between phases once `flag` becomes true.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Run every level, then tear down.
    pub fn run<R: Recorder + ?Sized>(
        &self,
        recorder: &mut R,
        config: &ProtocolConfig,
    ) -> ProtocolReport {
        let mut report = ProtocolReport {
            completed_levels: Vec::new(),
            summary: None,
            error: None,
        };

        if let Err(e) = recorder.start() {
            log::error!("failed to start recording: {e}");
            report.error = Some(e);
            return report;
        }

        log::info!(
            "protocol: levels {:?}, rest {}s, stress {}s, {} worker(s), {} generator",
            config.levels,
            config.rest.as_secs_f64(),
            config.stress.as_secs_f64(),
            config.cpu_workers,
            self.generator.name()
        );

        let levels = recorder
            .mark(START_MARKER)
            .and_then(|()| self.run_levels(&*recorder, config, &mut report.completed_levels));
        if let Err(e) = levels {
            if matches!(e, Error::Interrupted) {
                log::warn!("protocol interrupted, stopping");
            } else {
                log::error!("protocol aborted: {e}");
            }
            report.error = Some(e);
        }

        if let Err(e) = recorder.mark(END_MARKER) {
            report.error.get_or_insert(e);
        }

        match recorder.stop() {
            Ok(Some(summary)) => {
                if let Some(msg) = &summary.sink_error {
                    report.error.get_or_insert(Error::SinkFailed(msg.clone()));
                }
                report.summary = Some(summary);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("failed to stop recording: {e}");
                report.error.get_or_insert(e);
            }
        }
        report
    }

    fn run_levels<R: Recorder + ?Sized>(
        &self,
        recorder: &R,
        config: &ProtocolConfig,
        completed: &mut Vec<u32>,
    ) -> Result<()> {
        for &level in &config.levels {
            for phase in [Phase::Rest, Phase::Stress] {
                self.check_interrupt()?;
                self.run_phase(recorder, config, phase, level)?;
            }
            completed.push(level);
            log::info!(
                "[ok] completed level {level}% (rest {}s + stress {}s)",
                config.rest.as_secs_f64(),
                config.stress.as_secs_f64()
            );
        }
        Ok(())
    }

    fn run_phase<R: Recorder + ?Sized>(
        &self,
        recorder: &R,
        config: &ProtocolConfig,
        phase: Phase,
        level: u32,
    ) -> Result<()> {
        let load = phase.load(level);
        recorder.set_load(load);
        recorder.mark(&phase.begin_marker(level))?;
        self.generator
            .run_phase(load, config.cpu_workers, config.duration(phase))?;
        recorder.mark(&phase.end_marker(level))
    }

    fn check_interrupt(&self) -> Result<()> {
        match &self.interrupt {
            Some(flag) if flag.load(Ordering::SeqCst) => Err(Error::Interrupted),
            _ => Ok(()),
        }
    }
}
