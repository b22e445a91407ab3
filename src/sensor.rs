//! Single-value sensors read through `sysctl -n`.

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::check::{CheckLine, CheckStatus};

pub const CPU_TEMPERATURE_KEY: &str = "dev.cpu.0.temperature";
pub const CPU_FREQUENCY_KEY: &str = "dev.cpu.0.freq";

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Failed to run sysctl: {0}")]
    Io(#[from] std::io::Error),
    #[error("sysctl {key} exited with {status}: {stderr}")]
    Failed {
        key: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("sysctl {key} returned non-numeric value '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Reads `key` with `sysctl -n` and parses it as a number.
///
/// # Errors
///
/// Returns [`SensorError`] if sysctl cannot be run, fails, or prints
/// something that is not a number.
pub async fn read_sysctl(key: &str) -> Result<f64, SensorError> {
    let output = Command::new("sysctl").arg("-n").arg(key).output().await?;
    if !output.status.success() {
        return Err(SensorError::Failed {
            key: key.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let raw = String::from_utf8_lossy(&output.stdout);
    debug!(key, value = %raw.trim(), "Read sysctl");
    parse_value(key, &raw)
}

/// Parses a sysctl value, accepting a trailing `C` unit as FreeBSD prints
/// for temperatures.
pub fn parse_value(key: &str, raw: &str) -> Result<f64, SensorError> {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix('C')
        .unwrap_or(trimmed)
        .parse()
        .map_err(|_| SensorError::InvalidValue {
            key: key.to_string(),
            value: trimmed.to_string(),
        })
}

pub fn temperature_line(celsius: f64) -> CheckLine {
    CheckLine::new(
        CheckStatus::Dynamic,
        "CPU temperature",
        format!("temp={celsius};65;75"),
        format!("{celsius}C"),
    )
}

pub fn frequency_line(mhz: f64) -> CheckLine {
    CheckLine::new(
        CheckStatus::Ok,
        "CPU frequency",
        format!("freq={mhz}"),
        format!("{mhz}MHz"),
    )
}

/// Reads both CPU sensors and renders their check lines.
///
/// # Errors
///
/// Returns the first sensor that fails to read.
pub async fn cpu_lines() -> Result<Vec<CheckLine>, SensorError> {
    let temperature = read_sysctl(CPU_TEMPERATURE_KEY).await?;
    let frequency = read_sysctl(CPU_FREQUENCY_KEY).await?;
    Ok(vec![temperature_line(temperature), frequency_line(frequency)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(CPU_TEMPERATURE_KEY, "45.0C\n").unwrap(), 45.0);
        assert_eq!(parse_value(CPU_FREQUENCY_KEY, "2400\n").unwrap(), 2400.0);
        assert!(matches!(
            parse_value(CPU_FREQUENCY_KEY, "unknown oid"),
            Err(SensorError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_cpu_lines_format() {
        assert_eq!(
            temperature_line(45.5).to_string(),
            r#"P "CPU temperature" temp=45.5;65;75 45.5C"#
        );
        assert_eq!(
            frequency_line(2400.0).to_string(),
            r#"0 "CPU frequency" freq=2400 2400MHz"#
        );
    }
}
