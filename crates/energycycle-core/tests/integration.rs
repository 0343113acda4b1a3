//! Integration tests for energycycle-core.
//!
//! These tests run the full pipeline through the public API:
//! sensor → sampler → CSV file ← markers ← phase controller.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use energycycle_core::{
    HEADER, ManualClock, PhaseController, ProtocolConfig, Reading, Sampler, SamplerConfig,
    SensorSource, SessionSummary, SimulatedLoad, SimulatedSensor, parse_levels,
};

fn records(path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    assert_eq!(
        reader.headers().unwrap(),
        &csv::StringRecord::from(HEADER.to_vec())
    );
    reader.records().map(|r| r.unwrap()).collect()
}

fn zero_protocol(levels: &[u32]) -> ProtocolConfig {
    ProtocolConfig {
        levels: levels.to_vec(),
        rest: Duration::ZERO,
        stress: Duration::ZERO,
        cpu_workers: 1,
    }
}

/// Cycles through a fixed list of readings.
struct CyclingSensor {
    readings: Vec<Reading>,
    next: std::sync::atomic::AtomicUsize,
}

impl SensorSource for CyclingSensor {
    fn name(&self) -> &'static str {
        "cycling"
    }

    fn read(&self) -> Reading {
        let i = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.readings[i % self.readings.len()]
    }
}

#[test]
fn protocol_marker_sequence_in_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("run").join("energy_cycle_log.csv");
    let mut sampler = Sampler::new(
        SamplerConfig {
            interval: Duration::from_millis(50),
            output: path.clone(),
            ..Default::default()
        },
        Box::new(SimulatedSensor::default()),
    );
    let controller = PhaseController::new(Box::new(SimulatedLoad::new()));
    let report = controller.run(&mut sampler, &zero_protocol(&[0, 50]));
    assert!(report.is_success(), "{:?}", report.error);

    let markers: Vec<String> = records(&path)
        .into_iter()
        .filter(|r| !r[6].is_empty())
        .map(|r| r[6].to_string())
        .collect();
    assert_eq!(
        markers,
        [
            "START_PROTOCOL",
            "REST_BEGIN_0",
            "REST_END_0",
            "STRESS_0_BEGIN",
            "STRESS_0_END",
            "REST_BEGIN_50",
            "REST_END_50",
            "STRESS_50_BEGIN",
            "STRESS_50_END",
            "END_PROTOCOL",
        ]
    );
}

#[test]
fn marker_rows_never_carry_numbers() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("log.csv");
    let mut sampler = Sampler::new(
        SamplerConfig {
            interval: Duration::from_millis(50),
            output: path.clone(),
            ..Default::default()
        },
        Box::new(SimulatedSensor::default()),
    );
    let controller = PhaseController::new(Box::new(SimulatedLoad::new()));
    let config = ProtocolConfig {
        rest: Duration::from_millis(150),
        stress: Duration::from_millis(150),
        ..zero_protocol(&[30])
    };
    assert!(controller.run(&mut sampler, &config).is_success());

    let rows = records(&path);
    assert!(rows.iter().any(|r| r[6].is_empty()), "no data rows written");
    for row in &rows {
        assert_eq!(row.len(), HEADER.len());
        if row[6].is_empty() {
            assert!(!row[2].is_empty(), "data row without load: {row:?}");
            assert!(!row[7].is_empty(), "data row without dt: {row:?}");
        } else {
            for col in [2, 3, 4, 5, 7, 8] {
                assert!(row[col].is_empty(), "marker row with {}: {row:?}", HEADER[col]);
            }
        }
        // Timestamp and epoch are always present.
        assert!(!row[0].is_empty());
        assert!(row[1].parse::<f64>().is_ok());
    }
}

#[test]
fn stop_right_after_start_leaves_parseable_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("log.csv");
    let mut sampler = Sampler::new(
        SamplerConfig {
            output: path.clone(),
            ..Default::default()
        },
        Box::new(SimulatedSensor::default()),
    );
    sampler.start().unwrap();
    sampler.stop().unwrap();

    let rows = records(&path);
    assert!(rows.len() <= 1);
}

#[test]
fn energy_column_matches_power_times_dt() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("log.csv");
    let clock = Arc::new(ManualClock::new());
    let sensor = CyclingSensor {
        readings: vec![
            Reading::valid(5.0, 1.0),
            Reading::unavailable(),
            Reading::valid(5.0, 0.5),
        ],
        next: Default::default(),
    };
    let mut sampler = Sampler::with_clock(
        SamplerConfig {
            interval: Duration::from_millis(250),
            output: path.clone(),
            duration: Some(Duration::from_secs(3)),
            stop_timeout: None,
        },
        Box::new(sensor),
        clock,
    );
    sampler.start().unwrap();
    while !sampler.is_finished() {
        std::thread::sleep(Duration::from_millis(5));
    }
    let summary = sampler.stop().unwrap().unwrap();
    assert_eq!(summary.samples, 12);
    assert_eq!(summary.failed_reads, 4);

    let rows = records(&path);
    let mut expected = 0.0;
    let mut previous = 0.0;
    for (i, row) in rows.iter().enumerate() {
        let dt: f64 = row[7].parse().unwrap();
        let energy: f64 = row[8].parse().unwrap();
        if i == 0 {
            assert_eq!(dt, 0.0);
        } else {
            assert!((dt - 0.25).abs() < 1e-9);
        }
        match row[5].parse::<f64>() {
            Ok(power) => expected += power * dt,
            Err(_) => {
                assert!(row[3].is_empty() && row[4].is_empty());
                assert_eq!(energy, previous, "failed read changed energy");
            }
        }
        assert!((energy - expected).abs() < 1e-6, "row {i}: {energy} vs {expected}");
        previous = energy;
    }
    assert!((summary.total_energy_j - expected).abs() < 1e-6);
    assert!((summary.total_energy_wh - expected / 3600.0).abs() < 1e-9);
}

#[test]
fn summary_written_as_json() {
    let tmp = tempfile::tempdir().unwrap();
    let mut sampler = Sampler::new(
        SamplerConfig {
            interval: Duration::from_millis(50),
            output: tmp.path().join("log.csv"),
            ..Default::default()
        },
        Box::new(SimulatedSensor::default()),
    );
    let controller = PhaseController::new(Box::new(SimulatedLoad::new()));
    let summary = controller
        .run(&mut sampler, &zero_protocol(&[10]))
        .into_result()
        .unwrap()
        .unwrap();

    let json = tmp.path().join("summary.json");
    summary.write_json(&json).unwrap();
    let parsed = SessionSummary::read_json(&json).unwrap();
    assert_eq!(parsed, summary);
    assert_eq!(parsed.markers, 6);
    assert_eq!(parsed.sensor, "simulated");
}

#[test]
fn level_parsing_examples() {
    assert_eq!(
        parse_levels("default").unwrap(),
        vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]
    );
    assert_eq!(parse_levels("0:100:25").unwrap(), vec![0, 25, 50, 75, 100]);
    assert_eq!(parse_levels("5,7,9").unwrap(), vec![5, 7, 9]);
    assert!(parse_levels("0:100").is_err());
}
