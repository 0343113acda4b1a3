//! # energycycle-core
//!
//! **Measure how much energy a CPU load level costs.**
//!
//! `energycycle-core` samples a voltage/current sensor on a fixed cadence,
//! integrates power into cumulative energy and writes one CSV row per sample,
//! while a phase controller steps a load generator through a repeatable
//! rest/stress protocol and drops marker rows at every phase boundary.
//!
//! ## Quick Start
//!
//! ```no_run
//! use energycycle_core::{
//!     PhaseController, ProtocolConfig, Sampler, SamplerConfig, SensorKind, create_sensor,
//!     select_load_generator,
//! };
//!
//! let sensor = create_sensor(&SensorKind::Auto);
//! let mut sampler = Sampler::new(SamplerConfig::default(), sensor);
//! let controller = PhaseController::new(select_load_generator(false));
//!
//! let report = controller.run(&mut sampler, &ProtocolConfig::default());
//! if let Some(summary) = &report.summary {
//!     println!("{:.3} J", summary.total_energy_j);
//! }
//! ```
//!
//! ## Architecture
//!
//! Sensor → Sampler → CSV sink ← markers ← Phase controller → Load generator
//!
//! The sampler runs on its own thread. The controller only touches it through
//! the [`Recorder`] trait: a load annotation, marker rows, start and stop.

pub mod clock;
pub mod error;
pub mod integrator;
pub mod levels;
pub mod loadgen;
pub mod protocol;
pub mod recorder;
pub mod row;
pub mod sampler;
pub mod schedule;
pub mod sensor;
pub mod sink;
pub mod summary;
pub mod util;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use integrator::EnergyAccumulator;
pub use levels::{DEFAULT_LEVELS, parse_levels};
pub use loadgen::{LoadGenerator, SimulatedLoad, StressNg, select_load_generator};
pub use protocol::{Phase, PhaseController, ProtocolConfig, ProtocolReport};
pub use recorder::{NullRecorder, Recorder};
pub use row::{HEADER, Marker, Row, Sample};
pub use sampler::{Sampler, SamplerConfig};
pub use schedule::{MIN_INTERVAL, TickSchedule};
pub use sensor::{
    HwmonSensor, PmicSensor, Reading, SensorKind, SensorSource, SimulatedSensor, create_sensor,
};
pub use sink::CsvSink;
pub use summary::SessionSummary;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
