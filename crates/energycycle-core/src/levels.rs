//! Load level sequences.
//!
//! Accepted forms:
//! - `default` (also `std`, `standard`, any case): 0, 10, ..., 100
//! - `A:B:S`: inclusive range from A to B in steps of S
//! - `A,B,C`: explicit list; empty entries are skipped

use crate::error::{Error, Result};

/// 0 through 100 in steps of 10.
pub const DEFAULT_LEVELS: [u32; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// Highest load percentage a level may request.
pub const MAX_LEVEL: u32 = 100;

/// Parse a level specification into the sequence of load percentages.
pub fn parse_levels(spec: &str) -> Result<Vec<u32>> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(Error::levels(spec, "empty"));
    }

    let levels = match trimmed.to_ascii_lowercase().as_str() {
        "default" | "std" | "standard" => DEFAULT_LEVELS.to_vec(),
        _ if trimmed.contains(':') => parse_range(spec, trimmed)?,
        _ => parse_list(spec, trimmed)?,
    };

    if levels.is_empty() {
        return Err(Error::levels(spec, "no levels given"));
    }
    if let Some(bad) = levels.iter().find(|&&l| l > MAX_LEVEL) {
        return Err(Error::levels(spec, format!("level {bad} exceeds {MAX_LEVEL}")));
    }
    Ok(levels)
}

fn parse_number(spec: &str, text: &str) -> Result<u32> {
    let text = text.trim();
    text.parse()
        .map_err(|_| Error::levels(spec, format!("'{text}' is not a non-negative integer")))
}

fn parse_range(spec: &str, text: &str) -> Result<Vec<u32>> {
    let parts: Vec<&str> = text.split(':').collect();
    let [start, end, step] = parts.as_slice() else {
        return Err(Error::levels(spec, "range must be START:END:STEP"));
    };
    let start = parse_number(spec, start)?;
    let end = parse_number(spec, end)?;
    let step = parse_number(spec, step)?;

    if step == 0 {
        return Err(Error::levels(spec, "step must be positive"));
    }
    if start > end {
        return Err(Error::levels(spec, "start must not exceed end"));
    }
    Ok((start..=end).step_by(step as usize).collect())
}

fn parse_list(spec: &str, text: &str) -> Result<Vec<u32>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number(spec, s))
        .collect()
}
