//! Harvest executor.
//!
//! [`Harvester`] spawns the stream process, starts the consumer task, and
//! lets the [`Watchdog`] decide when to stop:
//! - Async execution via `tokio`
//! - Deadline plus early exit once both slots are latched
//! - Bounded teardown (terminate, grace period, kill)
//! - Structured logging via `tracing`

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, instrument};

use super::consumer::{consume, LineCounts};
use super::watchdog::{Watchdog, WatchdogState};
use crate::model::HarvestResult;
use crate::source::ProcessSource;
use crate::traits::{LineSource, SourceError};

/// Default harvest deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a process gets to exit after the termination request.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// `gpspipe -w`: gpsd reports as JSON, one object per line.
pub fn default_command() -> Vec<String> {
    vec!["gpspipe".to_string(), "-w".to_string()]
}

// ============================================================================
// Outcome Types
// ============================================================================

/// Everything known about a finished harvest.
#[derive(Debug)]
pub struct HarvestOutcome {
    /// Latched records
    pub result: HarvestResult,

    /// Terminal watchdog state
    pub state: WatchdogState,

    pub stats: HarvestStats,
}

/// Statistics about the harvest operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct HarvestStats {
    /// Time from spawn until the process was reaped (milliseconds)
    pub total_duration_ms: u64,

    /// Lines pulled from the process output
    pub lines_read: usize,

    /// Lines dropped because they did not decode
    pub lines_discarded: usize,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a harvest.
///
/// A timeout is not among them: it yields a partial [`HarvestResult`].
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// The stream process could not be started
    #[error("Failed to start stream process: {0}")]
    Spawn(#[from] SourceError),

    /// The consumer task panicked or was cancelled
    #[error("Consumer task failed: {0}")]
    Consumer(#[from] tokio::task::JoinError),
}

// ============================================================================
// Harvester
// ============================================================================

/// One-shot snapshot harvester.
///
/// # Example
///
/// ```ignore
/// use gps_harvester::harvest::Harvester;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let result = Harvester::new(["gpspipe", "-w"])
///         .with_timeout(Duration::from_secs(5))
///         .execute()
///         .await?;
///     println!("TPV latched: {}", result.tpv().is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Harvester {
    /// Program followed by its arguments
    command: Vec<String>,

    /// Deadline measured from spawn (default: 10 seconds)
    timeout: Duration,

    /// Wait after the termination request before killing (default: 2 seconds)
    grace_period: Duration,
}

impl Default for Harvester {
    fn default() -> Self {
        Self::new(default_command())
    }
}

impl Harvester {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Sets the harvest deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long a process may take to exit after being asked to
    /// terminate before it is killed.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs one harvest and returns the latched records.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Spawn`] if the command cannot be started.
    pub async fn execute(&self) -> Result<HarvestResult, HarvestError> {
        Ok(self.run().await?.result)
    }

    /// Like [`execute`](Self::execute), also reporting the terminal state and
    /// line statistics.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Spawn`] if the command cannot be started.
    #[instrument(skip(self), fields(command = ?self.command))]
    pub async fn run(&self) -> Result<HarvestOutcome, HarvestError> {
        let source = ProcessSource::spawn(&self.command)?;
        self.run_with(source).await
    }

    /// Harvests from an already started source.
    ///
    /// The deadline is measured from this call. The source is terminated and
    /// awaited before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Consumer`] if the consumer task panicked.
    pub async fn run_with<S>(&self, source: S) -> Result<HarvestOutcome, HarvestError>
    where
        S: LineSource + 'static,
    {
        let mut watchdog = Watchdog::start(self.timeout);
        let (stop_tx, stop_rx) = oneshot::channel();
        let consumer = tokio::spawn(consume(source, stop_rx, self.grace_period));

        let consumed = watchdog.supervise(consumer, stop_tx).await?;

        let stats = stats_from(consumed.counts, watchdog.elapsed());
        let result = consumed.slots.into_result();

        info!(
            state = ?watchdog.state(),
            sky = result.sky().is_some(),
            tpv = result.tpv().is_some(),
            lines = stats.lines_read,
            discarded = stats.lines_discarded,
            duration_ms = stats.total_duration_ms,
            "Harvest finished"
        );

        Ok(HarvestOutcome {
            result,
            state: watchdog.state(),
            stats,
        })
    }
}

fn stats_from(counts: LineCounts, elapsed: Duration) -> HarvestStats {
    HarvestStats {
        total_duration_ms: elapsed.as_millis() as u64,
        lines_read: counts.read,
        lines_discarded: counts.discarded,
    }
}

/// Runs `command` until both a sky and a TPV record have been seen or
/// `timeout` expires.
///
/// # Errors
///
/// Returns [`HarvestError::Spawn`] if the command cannot be started.
pub async fn harvest(command: &[String], timeout: Duration) -> Result<HarvestResult, HarvestError> {
    Harvester::new(command.iter().cloned())
        .with_timeout(timeout)
        .execute()
        .await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::test_support::ScriptedSource;

    const SKY: &str = r#"{"class":"SKY","satellites":[{"used":true},{"used":false}]}"#;
    const TPV: &str = r#"{"class":"TPV","lat":1.0,"lon":2.0,"mode":3}"#;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_harvester_defaults() {
        let harvester = Harvester::default();
        assert_eq!(harvester.command(), ["gpspipe", "-w"]);
        assert_eq!(harvester.timeout(), DEFAULT_TIMEOUT);

        let harvester = Harvester::new(["cat"]).with_timeout(Duration::from_secs(1));
        assert_eq!(harvester.timeout(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_with_completes_early() {
        let (source, probe) = ScriptedSource::new(&[SKY, TPV], true);

        let outcome = Harvester::new(["unused"])
            .with_timeout(Duration::from_secs(5))
            .run_with(source)
            .await
            .unwrap();

        assert_eq!(outcome.state, WatchdogState::CompletedEarly);
        assert!(outcome.result.is_complete());
        assert_eq!(outcome.stats.lines_read, 2);
        assert_eq!(probe.terminate_calls(), 1);
        assert!(probe.waited());
    }

    #[tokio::test]
    async fn test_run_with_times_out() {
        let (source, probe) = ScriptedSource::new(&[SKY, SKY], true);

        let outcome = Harvester::new(["unused"])
            .with_timeout(Duration::from_millis(200))
            .run_with(source)
            .await
            .unwrap();

        assert_eq!(outcome.state, WatchdogState::TimedOut);
        assert!(outcome.result.sky().is_some());
        assert!(outcome.result.tpv().is_none());
        assert!(outcome.stats.total_duration_ms >= 200);
        assert_eq!(probe.terminate_calls(), 1);
        assert!(probe.waited());
    }

    #[tokio::test]
    async fn test_harvest_process_both_records() {
        let script = format!("echo '{SKY}'; echo '{TPV}'; exec sleep 30");
        let start = std::time::Instant::now();

        let result = harvest(&sh(&script), Duration::from_secs(10)).await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
        let sky = result.sky_view().unwrap();
        assert_eq!(sky.used_count(), 1);
        assert_eq!(sky.visible_count(), 2);
        let tpv = result.tpv_view().unwrap();
        assert_eq!(tpv.lat, 1.0);
        assert_eq!(tpv.lon, 2.0);
        assert_eq!(tpv.mode, 3);
    }

    #[tokio::test]
    async fn test_harvest_spawn_failure() {
        let result = harvest(&["nonexistent_command_12345".to_string()], DEFAULT_TIMEOUT).await;
        assert!(matches!(result, Err(HarvestError::Spawn(_))));
    }
}
