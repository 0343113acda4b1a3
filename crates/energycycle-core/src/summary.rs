//! End-of-session summary.
//!
//! Produced by the sampler when it stops and optionally written next to the
//! CSV as pretty-printed JSON for quick inspection.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Totals for one sampling session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub version: u32,
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub interval_ms: u64,
    pub sensor: String,
    /// Data rows written.
    pub samples: u64,
    /// Data rows whose reading was incomplete.
    pub failed_reads: u64,
    /// Marker rows written.
    pub markers: u64,
    pub total_energy_j: f64,
    pub total_energy_wh: f64,
    pub output: Option<String>,
    /// Set when the output sink failed mid-run.
    pub sink_error: Option<String>,
    pub energycycle_version: String,
}

impl SessionSummary {
    /// Mean power over the session, if any time elapsed.
    pub fn mean_power_w(&self) -> Option<f64> {
        (self.duration_ms > 0).then(|| self.total_energy_j / (self.duration_ms as f64 / 1000.0))
    }

    /// Write as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a summary written by [`SessionSummary::write_json`].
    pub fn read_json(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
