//! CPU load generators.
//!
//! [`StressNg`] shells out to `stress-ng`; [`SimulatedLoad`] just waits out the
//! phase. Both block for roughly the requested duration.

use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::util::command_exists;

/// Trait that every load generator must implement.
pub trait LoadGenerator: Send {
    fn name(&self) -> &'static str;

    /// Hold `target_percent` load on `cpu_workers` workers for `duration`.
    fn run_phase(&self, target_percent: u32, cpu_workers: u32, duration: Duration) -> Result<()>;
}

impl<G: LoadGenerator + ?Sized> LoadGenerator for Box<G> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn run_phase(&self, target_percent: u32, cpu_workers: u32, duration: Duration) -> Result<()> {
        (**self).run_phase(target_percent, cpu_workers, duration)
    }
}

fn validate(target_percent: u32, cpu_workers: u32) -> Result<()> {
    if target_percent > 100 {
        return Err(Error::InvalidArgument(format!(
            "target load {target_percent}% exceeds 100%"
        )));
    }
    if cpu_workers == 0 {
        return Err(Error::InvalidArgument(
            "at least one CPU worker is required".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// stress-ng
// ---------------------------------------------------------------------------

/// Runs `stress-ng -l <L> --cpu <N> -t <D>s`.
#[derive(Debug, Clone)]
pub struct StressNg {
    program: String,
}

impl StressNg {
    pub const PROGRAM: &'static str = "stress-ng";

    pub fn new() -> Self {
        Self::with_program(Self::PROGRAM)
    }

    /// Use a different executable with the same command line.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available() -> bool {
        command_exists(Self::PROGRAM)
    }

    fn args(target_percent: u32, cpu_workers: u32, duration: Duration) -> Vec<String> {
        // stress-ng only takes whole seconds.
        let secs = duration
            .as_secs()
            .saturating_add(u64::from(duration.subsec_nanos() > 0));
        vec![
            "-l".to_string(),
            target_percent.to_string(),
            "--cpu".to_string(),
            cpu_workers.to_string(),
            "-t".to_string(),
            format!("{secs}s"),
        ]
    }
}

impl Default for StressNg {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadGenerator for StressNg {
    fn name(&self) -> &'static str {
        "stress-ng"
    }

    fn run_phase(&self, target_percent: u32, cpu_workers: u32, duration: Duration) -> Result<()> {
        validate(target_percent, cpu_workers)?;
        // `-t 0` means "run forever" to stress-ng.
        if duration.is_zero() {
            log::debug!("skipping zero-length phase at {target_percent}%");
            return Ok(());
        }

        let args = Self::args(target_percent, cpu_workers, duration);
        let command = format!("{} {}", self.program, args.join(" "));
        log::info!("[run] {command}");

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| Error::LoadGenerator {
                command: command.clone(),
                status: e.to_string(),
            })?;

        if !status.success() {
            return Err(Error::LoadGenerator {
                command,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Simulated
// ---------------------------------------------------------------------------

/// Generates no load; sleeps for the phase duration.
#[derive(Default)]
pub struct SimulatedLoad {
    clock: Option<Arc<dyn Clock>>,
}

impl SimulatedLoad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep on `clock` instead of the OS.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock: Some(clock) }
    }
}

impl LoadGenerator for SimulatedLoad {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn run_phase(&self, target_percent: u32, cpu_workers: u32, duration: Duration) -> Result<()> {
        validate(target_percent, cpu_workers)?;
        log::info!(
            "[sim] {target_percent}% on {cpu_workers} worker(s) for {:.1}s",
            duration.as_secs_f64()
        );
        match &self.clock {
            Some(clock) => clock.sleep(duration),
            None => std::thread::sleep(duration),
        }
        Ok(())
    }
}

/// Pick `stress-ng` if it is installed and not overridden, else the simulated
/// generator.
pub fn select_load_generator(force_simulated: bool) -> Box<dyn LoadGenerator> {
    if force_simulated {
        log::info!("using simulated load generator");
        return Box::new(SimulatedLoad::new());
    }
    if StressNg::is_available() {
        Box::new(StressNg::new())
    } else {
        log::warn!("stress-ng not found on PATH, using simulated load generator");
        Box::new(SimulatedLoad::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    // -----------------------------------------------------------------------
    // Argument tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_args_layout() {
        let args = StressNg::args(40, 2, Duration::from_secs(80));
        assert_eq!(args, vec!["-l", "40", "--cpu", "2", "-t", "80s"]);
    }

    #[test]
    fn test_args_round_fractional_seconds_up() {
        let args = StressNg::args(0, 1, Duration::from_millis(1500));
        assert_eq!(args.last().unwrap(), "2s");
    }

    #[test]
    fn test_rejects_load_above_100() {
        let err = SimulatedLoad::new()
            .run_phase(101, 1, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = StressNg::with_program("true")
            .run_phase(50, 0, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    // -----------------------------------------------------------------------
    // Execution tests
    // -----------------------------------------------------------------------

    #[cfg(unix)]
    #[test]
    fn test_successful_exit() {
        StressNg::with_program("true")
            .run_phase(50, 1, Duration::from_secs(1))
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_error() {
        let err = StressNg::with_program("false")
            .run_phase(50, 1, Duration::from_secs(1))
            .unwrap_err();
        match err {
            Error::LoadGenerator { command, .. } => {
                assert_eq!(command, "false -l 50 --cpu 1 -t 1s");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_program_is_error() {
        let err = StressNg::with_program("energycycle-definitely-not-a-command")
            .run_phase(10, 1, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::LoadGenerator { .. }));
    }

    #[test]
    fn test_zero_duration_skips_process() {
        // Would fail if it were actually spawned.
        StressNg::with_program("energycycle-definitely-not-a-command")
            .run_phase(10, 1, Duration::ZERO)
            .unwrap();
    }

    #[test]
    fn test_simulated_sleeps_on_clock() {
        let clock = Arc::new(ManualClock::new());
        let load = SimulatedLoad::with_clock(clock.clone());
        load.run_phase(30, 4, Duration::from_secs(80)).unwrap();
        assert_eq!(clock.monotonic(), Duration::from_secs(80));
    }

    #[test]
    fn test_forced_simulation() {
        assert_eq!(select_load_generator(true).name(), "simulated");
    }
}
