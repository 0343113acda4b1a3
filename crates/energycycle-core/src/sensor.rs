//! Voltage/current sensor adapters.
//!
//! Every sensor implements the [`SensorSource`] trait. A read never fails: when
//! the underlying measurement is not obtainable the sensor returns a
//! [`Reading`] with the missing half set to `None`, and the sampler writes an
//! empty sample for that tick.
//!
//! Three adapters are provided:
//! - [`PmicSensor`]: Raspberry Pi 5 PMIC via `vcgencmd pmic_read_adc`
//! - [`HwmonSensor`]: a Linux hwmon power monitor (INA219/INA226 and friends)
//! - [`SimulatedSensor`]: noisy synthetic readings for machines without either

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::Rng;

use crate::error::Error;
use crate::util::{command_exists, run_command};

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One instantaneous voltage/current observation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    /// Volts, if available.
    pub voltage: Option<f64>,
    /// Amperes, if available.
    pub current: Option<f64>,
}

impl Reading {
    /// Build a reading, discarding non-finite or negative values.
    pub fn new(voltage: Option<f64>, current: Option<f64>) -> Self {
        Self {
            voltage: sanitize(voltage),
            current: sanitize(current),
        }
    }

    /// A complete reading.
    pub fn valid(voltage: f64, current: f64) -> Self {
        Self::new(Some(voltage), Some(current))
    }

    /// Nothing could be read this tick.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Instantaneous power in watts; present only when both halves are.
    pub fn power(&self) -> Option<f64> {
        match (self.voltage, self.current) {
            (Some(v), Some(i)) => Some(v * i),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.power().is_some()
    }
}

fn sanitize(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait that every voltage/current sensor must implement.
///
/// `read` is called once per sampling tick and must return well inside one
/// interval.
pub trait SensorSource: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Take one reading.
    fn read(&self) -> Reading;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn read(&self) -> Reading {
        (**self).read()
    }
}

// ---------------------------------------------------------------------------
// PMIC (vcgencmd)
// ---------------------------------------------------------------------------

/// Core rail voltage/current from the Raspberry Pi PMIC ADC.
#[derive(Debug, Clone)]
pub struct PmicSensor {
    program: String,
}

impl PmicSensor {
    pub const VOLTAGE_LABEL: &'static str = "VDD_CORE_V";
    pub const CURRENT_LABEL: &'static str = "VDD_CORE_A";

    pub fn new() -> Self {
        Self::with_program("vcgencmd")
    }

    /// Use a different executable in place of `vcgencmd`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PmicSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for PmicSensor {
    fn name(&self) -> &'static str {
        "pmic"
    }

    fn read(&self) -> Reading {
        match run_command(&self.program, &["pmic_read_adc"]) {
            Some(stdout) => parse_pmic_output(&stdout),
            None => Reading::unavailable(),
        }
    }
}

/// Extract the core rail voltage and current from `pmic_read_adc` output.
///
/// Lines look like ` VDD_CORE_V volt(15)=0.84000000V`. A label that is
/// missing or whose value fails to parse leaves that half of the reading
/// empty.
pub fn parse_pmic_output(output: &str) -> Reading {
    let mut voltage = None;
    let mut current = None;

    for line in output.lines() {
        if line.contains(PmicSensor::VOLTAGE_LABEL) {
            voltage = labelled_value(line, 'V');
        }
        if line.contains(PmicSensor::CURRENT_LABEL) {
            current = labelled_value(line, 'A');
        }
    }

    Reading::new(voltage, current)
}

fn labelled_value(line: &str, unit: char) -> Option<f64> {
    let (_, value) = line.split_once('=')?;
    value.trim().trim_end_matches(unit).trim().parse().ok()
}

// ---------------------------------------------------------------------------
// hwmon
// ---------------------------------------------------------------------------

/// Bus voltage and current from a Linux hwmon device directory.
///
/// Reads `in1_input` (millivolts) and `curr1_input` (milliamperes), the
/// attributes exposed by the `ina2xx` driver.
#[derive(Debug, Clone)]
pub struct HwmonSensor {
    dir: PathBuf,
}

impl HwmonSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_milli(&self, attribute: &str) -> Option<f64> {
        let raw = fs::read_to_string(self.dir.join(attribute)).ok()?;
        raw.trim().parse::<f64>().ok().map(|v| v / 1000.0)
    }
}

impl SensorSource for HwmonSensor {
    fn name(&self) -> &'static str {
        "hwmon"
    }

    fn read(&self) -> Reading {
        Reading::new(self.read_milli("in1_input"), self.read_milli("curr1_input"))
    }
}

// ---------------------------------------------------------------------------
// Simulated
// ---------------------------------------------------------------------------

/// Synthetic readings around a nominal operating point.
///
/// Voltage jitters by ±1 % and current by ±10 %. With probability `dropout`
/// a read returns nothing, which exercises the empty-sample path.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    pub nominal_voltage: f64,
    pub nominal_current: f64,
    pub dropout: f64,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self {
            nominal_voltage: 0.85,
            nominal_current: 1.5,
            dropout: 0.0,
        }
    }
}

impl SensorSource for SimulatedSensor {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn read(&self) -> Reading {
        let mut rng = rand::rng();
        if self.dropout > 0.0 && rng.random_bool(self.dropout.min(1.0)) {
            return Reading::unavailable();
        }
        let voltage = self.nominal_voltage * (1.0 + rng.random_range(-0.01..=0.01));
        let current = self.nominal_current * (1.0 + rng.random_range(-0.1..=0.1));
        Reading::valid(voltage, current)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Which sensor adapter to build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SensorKind {
    /// PMIC when `vcgencmd` is installed, simulated otherwise.
    #[default]
    Auto,
    Pmic,
    Hwmon(PathBuf),
    Simulated,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Pmic => write!(f, "pmic"),
            Self::Hwmon(dir) => write!(f, "hwmon:{}", dir.display()),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for SensorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(dir) = s.strip_prefix("hwmon:") {
            if dir.is_empty() {
                return Err(Error::InvalidArgument(
                    "hwmon sensor needs a directory, e.g. hwmon:/sys/class/hwmon/hwmon2".into(),
                ));
            }
            return Ok(Self::Hwmon(PathBuf::from(dir)));
        }
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pmic" | "vcgencmd" => Ok(Self::Pmic),
            "simulated" | "sim" => Ok(Self::Simulated),
            other => Err(Error::InvalidArgument(format!("unknown sensor '{other}'"))),
        }
    }
}

/// Factory: build the sensor adapter for `kind`.
pub fn create_sensor(kind: &SensorKind) -> Box<dyn SensorSource> {
    match kind {
        SensorKind::Auto => {
            if command_exists("vcgencmd") {
                Box::new(PmicSensor::new())
            } else {
                log::warn!("vcgencmd not found, using simulated sensor readings");
                Box::new(SimulatedSensor::default())
            }
        }
        SensorKind::Pmic => Box::new(PmicSensor::new()),
        SensorKind::Hwmon(dir) => Box::new(HwmonSensor::new(dir.clone())),
        SensorKind::Simulated => Box::new(SimulatedSensor::default()),
    }
}
