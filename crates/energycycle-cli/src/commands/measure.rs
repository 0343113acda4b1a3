//! `energycycle --measure <secs>`: sample for a fixed time with no protocol.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use energycycle_core::{Error, Sampler, SamplerConfig, SensorKind, create_sensor};

use super::{exit_code, install_interrupt_handler, report_summary};

pub struct MeasureArgs {
    pub duration: Duration,
    pub interval: Duration,
    pub out: PathBuf,
    pub sensor: SensorKind,
    pub summary: Option<PathBuf>,
}

/// Run the measure command. Returns the process exit code.
pub fn run(args: MeasureArgs) -> i32 {
    let config = SamplerConfig {
        interval: args.interval,
        output: args.out,
        duration: Some(args.duration),
        stop_timeout: None,
    };
    let mut sampler = Sampler::new(config, create_sensor(&args.sensor));
    let interval = sampler.config().interval;

    println!(
        "Measuring energy for {:.1}s at {:.1} Hz...",
        args.duration.as_secs_f64(),
        1.0 / interval.as_secs_f64()
    );
    println!("Logging to {}", sampler.config().output.display());

    let interrupted = install_interrupt_handler();
    if let Err(e) = sampler.start() {
        log::error!("failed to start sampling: {e}");
        return exit_code(Some(&e));
    }

    let poll = interval.min(Duration::from_millis(100));
    while !sampler.is_finished() {
        if interrupted.load(Ordering::SeqCst) {
            log::warn!("interrupted, stopping");
            break;
        }
        std::thread::sleep(poll);
    }

    let mut error = interrupted
        .load(Ordering::SeqCst)
        .then_some(Error::Interrupted);
    match sampler.stop() {
        Ok(Some(summary)) => {
            if let Some(msg) = &summary.sink_error {
                error.get_or_insert(Error::SinkFailed(msg.clone()));
            }
            if let Err(e) = report_summary(&summary, args.summary.as_deref()) {
                error.get_or_insert(e);
            }
        }
        Ok(None) => {}
        Err(e) => {
            error.get_or_insert(e);
        }
    }

    if let Some(e) = &error {
        log::error!("{e}");
    }
    exit_code(error.as_ref())
}
