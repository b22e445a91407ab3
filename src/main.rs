use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gps_harvester::check::{self, CheckLine};
use gps_harvester::harvest::{default_command, Harvester, DEFAULT_GRACE_PERIOD, DEFAULT_TIMEOUT};
use gps_harvester::sensor;

/// Checkmk local checks for a gpsd-attached receiver.
#[derive(Parser, Debug)]
#[command(name = "gps-check", version)]
struct Cli {
    #[command(subcommand)]
    check: Option<Check>,
}

#[derive(Subcommand, Debug)]
enum Check {
    /// Satellites, lock, position and fix time from a gpsd JSON stream
    Gps {
        /// Seconds to wait for both a SKY and a TPV report
        #[arg(long, value_parser = parse_seconds, default_value = "10")]
        timeout: Duration,

        /// Seconds the stream process gets to exit before it is killed
        #[arg(long, value_parser = parse_seconds, default_value = "2")]
        grace: Duration,

        /// Stream command and arguments (default: gpspipe -w)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// CPU temperature and frequency via sysctl
    Cpu,
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("invalid seconds '{raw}': {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid seconds '{raw}': {e}"))
}

#[tokio::main]
async fn main() {
    // stdout carries the check output; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let check = cli.check.unwrap_or(Check::Gps {
        timeout: DEFAULT_TIMEOUT,
        grace: DEFAULT_GRACE_PERIOD,
        command: Vec::new(),
    });

    let lines = match check {
        Check::Gps {
            timeout,
            grace,
            command,
        } => {
            let command = if command.is_empty() {
                default_command()
            } else {
                command
            };
            let harvester = Harvester::new(command)
                .with_timeout(timeout)
                .with_grace_period(grace);
            match harvester.execute().await {
                Ok(result) => check::render(&result),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Check::Cpu => match sensor::cpu_lines().await {
            Ok(lines) => lines,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
    };

    print_lines(&lines);
}

fn print_lines(lines: &[CheckLine]) {
    for line in lines {
        println!("{line}");
    }
}
