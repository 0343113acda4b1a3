//! Background sampling and energy integration.
//!
//! A [`Sampler`] owns one worker thread that ticks on a fixed schedule, reads
//! the sensor, integrates energy and appends one data row per tick to the CSV
//! sink. Other threads interact with it only through [`Sampler::set_load`]
//! (annotate subsequent samples) and [`Sampler::mark`] (append a marker row).
//!
//! # Scheduling
//!
//! Tick targets advance by exactly one interval from the previous target. A
//! tick that overruns makes the following ticks fire immediately until the
//! schedule has caught up, so the long-run rate does not drift. Energy, on
//! the other hand, is integrated over the real time between fired ticks.
//!
//! # Shutdown
//!
//! [`Sampler::stop`] raises the stop flag and waits a bounded time for the
//! worker to notice. Whether or not it does, the sink is then flushed and
//! closed under the same mutex the worker writes through, so a row is never
//! torn. Dropping a running `Sampler` stops it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::integrator::EnergyAccumulator;
use crate::row::{Marker, Row, Sample};
use crate::schedule::{TickSchedule, clamp_interval};
use crate::sensor::{Reading, SensorSource};
use crate::sink::CsvSink;
use crate::summary::SessionSummary;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "energy_cycle_log.csv";

/// Configuration for a sampling session.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Tick interval; clamped to [`crate::schedule::MIN_INTERVAL`].
    pub interval: Duration,
    pub output: PathBuf,
    /// Stop on its own after this long. `None` samples until stopped.
    pub duration: Option<Duration>,
    /// How long `stop` waits for the worker. `None` uses
    /// [`SamplerConfig::stop_timeout`]'s default.
    pub stop_timeout: Option<Duration>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            output: PathBuf::from(DEFAULT_OUTPUT),
            duration: None,
            stop_timeout: None,
        }
    }
}

impl SamplerConfig {
    /// Effective stop timeout: the configured one, else four intervals but at
    /// least two seconds.
    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout.unwrap_or_else(|| {
            clamp_interval(self.interval)
                .saturating_mul(4)
                .max(Duration::from_secs(2))
        })
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State visible to both the worker and the controlling thread.
struct Shared {
    load: AtomicU32,
    stop: AtomicBool,
    finished: AtomicBool,
    output: Mutex<Output>,
}

/// The sink plus counters that change with every row written to it.
#[derive(Default)]
struct Output {
    sink: Option<CsvSink>,
    samples: u64,
    failed_reads: u64,
    markers: u64,
    energy_j: f64,
    error: Option<String>,
}

impl Shared {
    fn new() -> Self {
        Self {
            load: AtomicU32::new(0),
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            output: Mutex::new(Output::default()),
        }
    }

    fn load(&self) -> u32 {
        self.load.load(Ordering::SeqCst)
    }

    fn set_load(&self, percent: u32) {
        self.load.store(percent, Ordering::SeqCst);
    }

    fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn output(&self) -> MutexGuard<'_, Output> {
        self.output.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Output {
    /// Append a row. The first write error is remembered and returned (as
    /// `SinkFailed`) by every later write.
    fn write(&mut self, row: &Row) -> Result<()> {
        if let Some(err) = &self.error {
            return Err(Error::SinkFailed(err.clone()));
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(Error::NotRunning);
        };
        if let Err(e) = sink.write_row(row) {
            let msg = e.to_string();
            self.error = Some(msg.clone());
            return Err(Error::SinkFailed(msg));
        }
        match row {
            Row::Sample(s) => {
                self.samples += 1;
                if s.power.is_none() {
                    self.failed_reads += 1;
                }
                self.energy_j = s.energy_j;
            }
            Row::Marker(_) => self.markers += 1,
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sampling engine (runs on the worker thread)
// ---------------------------------------------------------------------------

struct SamplingEngine {
    clock: Arc<dyn Clock>,
    sensor: Box<dyn SensorSource>,
    schedule: TickSchedule,
    accumulator: EnergyAccumulator,
    shared: Arc<Shared>,
    deadline: Option<Duration>,
}

impl SamplingEngine {
    fn new(
        clock: Arc<dyn Clock>,
        sensor: Box<dyn SensorSource>,
        shared: Arc<Shared>,
        start: Duration,
        interval: Duration,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            clock,
            sensor,
            schedule: TickSchedule::new(start, interval),
            accumulator: EnergyAccumulator::new(),
            shared,
            deadline: duration.map(|d| start.saturating_add(d)),
        }
    }

    fn run(mut self) {
        while !self.shared.stop_requested() {
            self.schedule.wait(self.clock.as_ref());
            if self.shared.stop_requested() {
                break;
            }
            if let Some(deadline) = self.deadline
                && self.clock.monotonic() >= deadline
            {
                log::info!("sampling duration reached");
                break;
            }
            if let Err(e) = self.tick() {
                log::error!("sampling stopped: {e}");
                break;
            }
        }
        self.shared.finished.store(true, Ordering::SeqCst);
    }

    /// Fire one tick: capture, read, integrate, write, advance.
    ///
    /// The output lock is held from capture to write, so a concurrent `mark`
    /// lands either before this sample or after it, never between its
    /// timestamp and its row, and `set_load` only affects later samples.
    fn tick(&mut self) -> Result<Sample> {
        let shared = Arc::clone(&self.shared);
        let mut output = shared.output();

        let timestamp = self.clock.wall();
        let monotonic = self.clock.monotonic();
        let load_percent = shared.load();
        let reading = self.read_sensor();
        let step = self.accumulator.integrate(monotonic, &reading);

        if step.power.is_none() {
            log::warn!("voltage or current not available at this moment");
        }

        let sample = Sample {
            timestamp,
            monotonic,
            dt: step.dt,
            voltage: reading.voltage,
            current: reading.current,
            power: step.power,
            load_percent,
            energy_j: step.total_j,
        };
        output.write(&Row::Sample(sample.clone()))?;
        drop(output);
        self.schedule.advance();
        Ok(sample)
    }

    /// A panicking sensor counts as an unavailable reading.
    fn read_sensor(&self) -> Reading {
        let sensor = &self.sensor;
        catch_unwind(AssertUnwindSafe(|| sensor.read())).unwrap_or_else(|_| {
            log::warn!("sensor '{}' panicked during read", sensor.name());
            Reading::unavailable()
        })
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopped,
}

struct Worker {
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

struct Session {
    id: String,
    started_at: DateTime<Local>,
    started: Duration,
}

/// Periodic sampler writing one CSV row per tick.
pub struct Sampler {
    config: SamplerConfig,
    clock: Arc<dyn Clock>,
    sensor: Option<Box<dyn SensorSource>>,
    sensor_name: &'static str,
    shared: Arc<Shared>,
    worker: Option<Worker>,
    session: Option<Session>,
    state: State,
}

impl Sampler {
    /// A sampler on the system clock.
    pub fn new(config: SamplerConfig, sensor: Box<dyn SensorSource>) -> Self {
        Self::with_clock(config, sensor, Arc::new(SystemClock::new()))
    }

    /// A sampler on an explicit clock.
    pub fn with_clock(
        config: SamplerConfig,
        sensor: Box<dyn SensorSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = SamplerConfig {
            interval: clamp_interval(config.interval),
            ..config
        };
        Self {
            config,
            clock,
            sensor_name: sensor.name(),
            sensor: Some(sensor),
            shared: Arc::new(Shared::new()),
            worker: None,
            session: None,
            state: State::Idle,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Open the sink, write the header and start the worker thread.
    pub fn start(&mut self) -> Result<()> {
        if self.state != State::Idle || self.sensor.is_none() {
            return Err(Error::AlreadyStarted);
        }
        let sink = CsvSink::create(&self.config.output)?;
        let Some(sensor) = self.sensor.take() else {
            return Err(Error::AlreadyStarted);
        };
        self.shared.output().sink = Some(sink);

        let started = self.clock.monotonic();
        self.session = Some(Session {
            id: Uuid::new_v4().to_string(),
            started_at: self.clock.wall(),
            started,
        });

        let engine = SamplingEngine::new(
            Arc::clone(&self.clock),
            sensor,
            Arc::clone(&self.shared),
            started,
            self.config.interval,
            self.config.duration,
        );
        let (done_tx, done_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("energycycle-sampler".into())
            .spawn(move || {
                engine.run();
                let _ = done_tx.send(());
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                if let Some(sink) = self.shared.output().sink.take() {
                    let _ = sink.finish();
                }
                self.state = State::Stopped;
                return Err(e.into());
            }
        };

        self.worker = Some(Worker {
            handle,
            done: done_rx,
        });
        self.state = State::Running;
        log::info!(
            "sampling '{}' every {}ms to {}",
            self.sensor_name,
            self.config.interval.as_millis(),
            self.config.output.display()
        );
        Ok(())
    }

    /// Annotate all subsequent samples with `percent`.
    pub fn set_load(&self, percent: u32) {
        self.shared.set_load(percent);
    }

    /// Current load annotation.
    pub fn load(&self) -> u32 {
        self.shared.load()
    }

    /// Append a marker row now.
    pub fn mark(&self, text: &str) -> Result<()> {
        if self.state != State::Running {
            return Err(Error::NotRunning);
        }
        let mut output = self.shared.output();
        let marker = Marker {
            timestamp: self.clock.wall(),
            monotonic: self.clock.monotonic(),
            text: text.to_string(),
        };
        output.write(&Row::Marker(marker))?;
        log::info!("marker {text}");
        Ok(())
    }

    /// Whether the worker has exited on its own (duration reached or sink
    /// failure).
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Stop sampling, then flush and close the sink.
    ///
    /// Returns `Ok(None)` if the sampler was never started or is already
    /// stopped. A sink failure during the run is reported in
    /// [`SessionSummary::sink_error`]; only a failure of the final flush is
    /// returned as an error.
    pub fn stop(&mut self) -> Result<Option<SessionSummary>> {
        match self.state {
            State::Idle => {
                self.state = State::Stopped;
                return Ok(None);
            }
            State::Stopped => return Ok(None),
            State::Running => self.state = State::Stopped,
        }

        self.shared.request_stop();
        if let Some(worker) = self.worker.take() {
            let timeout = self.config.stop_timeout();
            match worker.done.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        log::error!("sampler thread panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "sampler thread did not exit within {:.1}s, closing output anyway",
                        timeout.as_secs_f64()
                    );
                }
            }
        }

        let mut output = self.shared.output();
        let finished = match output.sink.take() {
            Some(sink) => sink.finish(),
            None => Ok(()),
        };
        let summary = self.summarize(&output);
        drop(output);

        if let Some(err) = &summary.sink_error {
            log::error!("output sink failed during sampling: {err}");
        }
        log::info!(
            "stopped after {} samples ({} failed reads, {} markers), {:.3} J",
            summary.samples,
            summary.failed_reads,
            summary.markers,
            summary.total_energy_j
        );

        finished?;
        Ok(Some(summary))
    }

    fn summarize(&self, output: &Output) -> SessionSummary {
        let now = self.clock.monotonic();
        let (id, started_at, started) = match &self.session {
            Some(s) => (s.id.clone(), s.started_at, s.started),
            None => (String::new(), self.clock.wall(), now),
        };
        SessionSummary {
            version: 1,
            id,
            started_at: started_at.to_rfc3339(),
            ended_at: self.clock.wall().to_rfc3339(),
            duration_ms: now.saturating_sub(started).as_millis() as u64,
            interval_ms: self.config.interval.as_millis() as u64,
            sensor: self.sensor_name.to_string(),
            samples: output.samples,
            failed_reads: output.failed_reads,
            markers: output.markers,
            total_energy_j: output.energy_j,
            total_energy_wh: output.energy_j / 3600.0,
            output: Some(self.config.output.display().to_string()),
            sink_error: output.error.clone(),
            energycycle_version: crate::VERSION.to_string(),
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if self.state == State::Running
            && let Err(e) = self.stop()
        {
            log::error!("failed to close sampler output: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
