pub mod measure;
pub mod protocol;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use energycycle_core::{Error, SessionSummary};

/// Exit code for a run cut short by Ctrl+C.
pub const EXIT_INTERRUPTED: i32 = 128 + libc::SIGINT;

/// Log to stderr at `info`, or `debug` with `--verbose`. `RUST_LOG` wins.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();
}

/// Parse a non-negative number of seconds, fractions allowed.
pub fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("'{s}' must be a non-negative number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

/// Set a flag on Ctrl+C instead of killing the process, so the output is
/// always closed cleanly.
pub fn install_interrupt_handler() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }
    interrupted
}

/// Process exit code for a finished run.
pub fn exit_code(error: Option<&Error>) -> i32 {
    match error {
        None => 0,
        Some(Error::Interrupted) => EXIT_INTERRUPTED,
        Some(_) => 1,
    }
}

/// Print the energy totals and, if asked, write the summary JSON. A path of
/// `-` prints the JSON to stdout.
pub fn report_summary(summary: &SessionSummary, json_path: Option<&Path>) -> Result<(), Error> {
    println!();
    println!(
        "Total energy used: {:.3} J = {:.6} Wh",
        summary.total_energy_j, summary.total_energy_wh
    );
    println!(
        "  Samples:   {} ({} failed reads)",
        summary.samples, summary.failed_reads
    );
    println!("  Markers:   {}", summary.markers);
    if let Some(mean) = summary.mean_power_w() {
        println!("  Mean power: {mean:.3} W");
    }
    if let Some(output) = &summary.output {
        println!("  Output:    {output}");
    }

    match json_path {
        Some(path) if path == Path::new("-") => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        Some(path) => {
            summary.write_json(path)?;
            println!("  Summary:   {}", path.display());
        }
        None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("0.5").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_seconds("20").unwrap(), Duration::from_secs(20));
        assert_eq!(parse_seconds(" 0 ").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_seconds_rejects_bad_input() {
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("abc").is_err());
        assert!(parse_seconds("inf").is_err());
        assert!(parse_seconds("NaN").is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(None), 0);
        assert_eq!(exit_code(Some(&Error::Interrupted)), 130);
        assert_eq!(exit_code(Some(&Error::NotRunning)), 1);
    }
}
