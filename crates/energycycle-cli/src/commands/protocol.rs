//! `energycycle`: run the rest/stress protocol while logging energy.

use std::path::PathBuf;
use std::time::Duration;

use energycycle_core::{
    PhaseController, ProtocolConfig, Sampler, SamplerConfig, SensorKind, create_sensor,
    parse_levels, select_load_generator,
};

use super::{exit_code, install_interrupt_handler, report_summary};

pub struct ProtocolArgs {
    pub levels: String,
    pub cpu: u32,
    pub rest: Duration,
    pub stress: Duration,
    pub interval: Duration,
    pub out: PathBuf,
    pub sensor: SensorKind,
    pub simulate_load: bool,
    pub summary: Option<PathBuf>,
}

/// Run the protocol command. Returns the process exit code.
pub fn run(args: ProtocolArgs) -> i32 {
    // Level errors are fatal before anything starts.
    let levels = match parse_levels(&args.levels) {
        Ok(levels) => levels,
        Err(e) => {
            log::error!("{e}");
            return exit_code(Some(&e));
        }
    };

    let config = ProtocolConfig {
        levels,
        rest: args.rest,
        stress: args.stress,
        cpu_workers: args.cpu,
    };
    let sampler_config = SamplerConfig {
        interval: args.interval,
        output: args.out,
        ..Default::default()
    };

    let sensor = create_sensor(&args.sensor);
    let mut sampler = Sampler::new(sampler_config, sensor);
    let interrupted = install_interrupt_handler();
    let controller = PhaseController::new(select_load_generator(args.simulate_load))
        .with_interrupt(interrupted);

    println!("Energy cycle protocol");
    println!("  Levels:    {:?}", config.levels);
    println!(
        "  Phases:    rest {}s + stress {}s per level",
        config.rest.as_secs_f64(),
        config.stress.as_secs_f64()
    );
    println!("  Workers:   {}", config.cpu_workers);
    println!("  Generator: {}", controller.generator_name());
    println!("  Interval:  {}ms", sampler.config().interval.as_millis());
    println!("  Expected:  ~{}s", config.expected_duration().as_secs());
    println!("  Output:    {}", sampler.config().output.display());
    println!();

    let report = controller.run(&mut sampler, &config);
    println!(
        "Completed {} of {} levels",
        report.completed_levels.len(),
        config.levels.len()
    );

    let mut error = report.error;
    if let Some(summary) = &report.summary
        && let Err(e) = report_summary(summary, args.summary.as_deref())
    {
        log::error!("failed to write summary: {e}");
        error.get_or_insert(e);
    }

    if let Some(e) = &error {
        log::error!("{e}");
    }
    exit_code(error.as_ref())
}
