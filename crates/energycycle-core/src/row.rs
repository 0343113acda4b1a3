//! Rows of the output CSV: data samples and phase markers.
//!
//! Both kinds share one column layout. A data row leaves `marker` empty; a
//! marker row leaves every measurement column empty, which is how readers
//! tell the two apart.

use std::time::Duration;

use chrono::{DateTime, Local};

/// Column names, in order. The first seven are the stable public layout;
/// `dt_s` and `energy_j` carry the integration state of each data row.
pub const HEADER: [&str; 9] = [
    "timestamp_iso",
    "epoch_seconds",
    "load_percent",
    "voltage_v",
    "current_a",
    "power_w",
    "marker",
    "dt_s",
    "energy_j",
];

/// One tick's observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    /// Monotonic clock value at capture.
    pub monotonic: Duration,
    /// Time since the previous sample; zero for the first.
    pub dt: Duration,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    /// Present iff both `voltage` and `current` are.
    pub power: Option<f64>,
    pub load_percent: u32,
    /// Cumulative energy in joules up to and including this sample.
    pub energy_j: f64,
}

/// A named event delimiting protocol phases.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub timestamp: DateTime<Local>,
    pub monotonic: Duration,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Sample(Sample),
    Marker(Marker),
}

impl Row {
    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            Self::Sample(s) => s.timestamp,
            Self::Marker(m) => m.timestamp,
        }
    }

    /// Encode as CSV fields in [`HEADER`] order.
    pub fn to_record(&self) -> [String; 9] {
        let ts = self.timestamp();
        let iso = format_iso_millis(&ts);
        let epoch = format_epoch_seconds(&ts);

        match self {
            Self::Sample(s) => {
                // A partial reading is written as fully empty.
                let (v, i, p) = match s.power {
                    Some(p) => (fixed(s.voltage), fixed(s.current), fixed(Some(p))),
                    None => (String::new(), String::new(), String::new()),
                };
                [
                    iso,
                    epoch,
                    s.load_percent.to_string(),
                    v,
                    i,
                    p,
                    String::new(),
                    format!("{:.6}", s.dt.as_secs_f64()),
                    format!("{:.6}", s.energy_j),
                ]
            }
            Self::Marker(m) => [
                iso,
                epoch,
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                m.text.clone(),
                String::new(),
                String::new(),
            ],
        }
    }
}

impl From<Sample> for Row {
    fn from(sample: Sample) -> Self {
        Self::Sample(sample)
    }
}

impl From<Marker> for Row {
    fn from(marker: Marker) -> Self {
        Self::Marker(marker)
    }
}

/// Local time, ISO 8601 with millisecond precision and no offset.
/// Example: `2026-02-15T01:30:00.125`
pub fn format_iso_millis(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Seconds since the Unix epoch with three decimals.
pub fn format_epoch_seconds(ts: &DateTime<Local>) -> String {
    let millis = ts.timestamp_millis();
    format!("{}.{:03}", millis.div_euclid(1000), millis.rem_euclid(1000))
}

fn fixed(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_millis(millis: i64) -> DateTime<Local> {
        Local.timestamp_millis_opt(millis).unwrap()
    }

    fn sample(voltage: Option<f64>, current: Option<f64>) -> Sample {
        let power = match (voltage, current) {
            (Some(v), Some(i)) => Some(v * i),
            _ => None,
        };
        Sample {
            timestamp: at_millis(1_771_030_200_125),
            monotonic: Duration::from_millis(1500),
            dt: Duration::from_millis(500),
            voltage,
            current,
            power,
            load_percent: 40,
            energy_j: 12.5,
        }
    }

    #[test]
    fn test_header_prefix_is_stable() {
        assert_eq!(
            &HEADER[..7],
            &[
                "timestamp_iso",
                "epoch_seconds",
                "load_percent",
                "voltage_v",
                "current_a",
                "power_w",
                "marker"
            ]
        );
    }

    #[test]
    fn test_epoch_seconds_three_decimals() {
        assert_eq!(format_epoch_seconds(&at_millis(1_771_030_200_125)), "1771030200.125");
        assert_eq!(format_epoch_seconds(&at_millis(1_000_007)), "1000.007");
    }

    #[test]
    fn test_iso_has_millis() {
        let s = format_iso_millis(&at_millis(1_771_030_200_125));
        assert!(s.ends_with(".125"), "{s}");
        assert_eq!(s.len(), "2026-02-14T01:30:00.125".len());
    }

    #[test]
    fn test_sample_record_populates_measurements() {
        let rec = Row::from(sample(Some(5.0), Some(0.5))).to_record();
        assert_eq!(rec[1], "1771030200.125");
        assert_eq!(rec[2], "40");
        assert_eq!(rec[3], "5.000000");
        assert_eq!(rec[4], "0.500000");
        assert_eq!(rec[5], "2.500000");
        assert_eq!(rec[6], "");
        assert_eq!(rec[7], "0.500000");
        assert_eq!(rec[8], "12.500000");
    }

    #[test]
    fn test_incomplete_sample_leaves_measurements_empty() {
        let rec = Row::from(sample(Some(5.0), None)).to_record();
        assert_eq!(rec[3], "");
        assert_eq!(rec[4], "");
        assert_eq!(rec[5], "");
        assert_eq!(rec[6], "");
        assert_eq!(rec[8], "12.500000");
    }

    #[test]
    fn test_marker_record_has_no_numeric_fields() {
        let rec = Row::from(Marker {
            timestamp: at_millis(1_771_030_200_000),
            monotonic: Duration::from_secs(3),
            text: "STRESS_50_BEGIN".into(),
        })
        .to_record();
        assert!(!rec[0].is_empty());
        assert!(!rec[1].is_empty());
        for idx in [2, 3, 4, 5, 7, 8] {
            assert!(rec[idx].is_empty(), "column {} not empty", HEADER[idx]);
        }
        assert_eq!(rec[6], "STRESS_50_BEGIN");
    }
}
