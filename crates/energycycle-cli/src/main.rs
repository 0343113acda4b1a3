//! CLI for energycycle: log board energy across a CPU rest/stress protocol.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use energycycle_core::SensorKind;

use commands::parse_seconds;

#[derive(Parser)]
#[command(name = "energycycle")]
#[command(about = "Log board energy while stepping the CPU through rest/stress load levels")]
#[command(version = energycycle_core::VERSION)]
struct Cli {
    /// Number of CPU workers to stress
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    cpu: u32,

    /// Rest duration per level, in seconds (0% load)
    #[arg(long, default_value = "20", value_parser = parse_seconds)]
    rest: Duration,

    /// Stress duration per level, in seconds (at the level's load)
    #[arg(long, default_value = "80", value_parser = parse_seconds)]
    stress: Duration,

    /// Load levels: "default" (0..100 step 10), a list "0,50,100", or a range "0:100:25"
    #[arg(long, default_value = "default")]
    levels: String,

    /// Sampling interval in seconds (minimum 0.05)
    #[arg(long, default_value = "0.5", value_parser = parse_seconds)]
    interval: Duration,

    /// CSV output path
    #[arg(long, default_value = energycycle_core::sampler::DEFAULT_OUTPUT)]
    out: PathBuf,

    /// Sensor: auto, pmic, hwmon:<dir>, simulated
    #[arg(long, default_value = "auto")]
    sensor: SensorKind,

    /// Use the simulated load generator even if stress-ng is installed
    #[arg(long)]
    simulate_load: bool,

    /// Only sample for this many seconds; no load protocol
    #[arg(long, value_parser = parse_seconds)]
    measure: Option<Duration>,

    /// Write the session summary as JSON ("-" for stdout)
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);

    let code = match cli.measure {
        Some(duration) => commands::measure::run(commands::measure::MeasureArgs {
            duration,
            interval: cli.interval,
            out: cli.out,
            sensor: cli.sensor,
            summary: cli.summary,
        }),
        None => commands::protocol::run(commands::protocol::ProtocolArgs {
            levels: cli.levels,
            cpu: cli.cpu,
            rest: cli.rest,
            stress: cli.stress,
            interval: cli.interval,
            out: cli.out,
            sensor: cli.sensor,
            simulate_load: cli.simulate_load,
            summary: cli.summary,
        }),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["energycycle"]).unwrap();
        assert_eq!(cli.cpu, 1);
        assert_eq!(cli.rest, Duration::from_secs(20));
        assert_eq!(cli.stress, Duration::from_secs(80));
        assert_eq!(cli.levels, "default");
        assert_eq!(cli.interval, Duration::from_millis(500));
        assert_eq!(cli.out, PathBuf::from("energy_cycle_log.csv"));
        assert_eq!(cli.sensor, SensorKind::Auto);
        assert!(cli.measure.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "energycycle",
            "--cpu",
            "4",
            "--rest",
            "5",
            "--stress",
            "10.5",
            "--levels",
            "0:100:50",
            "--interval",
            "0.1",
            "--sensor",
            "simulated",
            "--simulate-load",
        ])
        .unwrap();
        assert_eq!(cli.cpu, 4);
        assert_eq!(cli.stress, Duration::from_millis(10_500));
        assert_eq!(cli.sensor, SensorKind::Simulated);
        assert!(cli.simulate_load);
    }

    #[test]
    fn test_zero_cpu_rejected() {
        assert!(Cli::try_parse_from(["energycycle", "--cpu", "0"]).is_err());
    }

    #[test]
    fn test_bad_sensor_rejected() {
        assert!(Cli::try_parse_from(["energycycle", "--sensor", "thermocouple"]).is_err());
    }

    #[test]
    fn test_clap_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
