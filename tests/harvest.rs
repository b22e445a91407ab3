use std::time::{Duration, Instant};

use gps_harvester::harvest::{Harvester, WatchdogState};
use gps_harvester::{harvest, ProcessSource};

const SKY: &str = r#"{"class":"SKY","satellites":[{"used":true},{"used":false}]}"#;
const LATER_SKY: &str = r#"{"class":"SKY","satellites":[{"used":true},{"used":true},{"used":true}]}"#;
const TPV: &str = r#"{"class":"TPV","lat":1.0,"lon":2.0,"mode":3}"#;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

#[tokio::test]
async fn both_classes_return_before_deadline() {
    let script = format!("echo '{SKY}'; sleep 0.1; echo '{TPV}'; exec sleep 60");
    let start = Instant::now();

    let result = harvest(&sh(&script), Duration::from_secs(10)).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    let sky = result.sky_view().expect("sky latched");
    assert_eq!(sky.used_count(), 1);
    assert_eq!(sky.visible_count(), 2);
    let tpv = result.tpv_view().expect("tpv latched");
    assert_eq!((tpv.lat, tpv.lon, tpv.mode), (1.0, 2.0, 3));
}

#[tokio::test]
async fn sky_only_stream_times_out_with_first_sky() {
    let script = format!("echo '{SKY}'; while true; do echo '{LATER_SKY}'; sleep 0.1; done");
    let start = Instant::now();

    let outcome = Harvester::new(sh(&script))
        .with_timeout(Duration::from_secs(1))
        .with_grace_period(Duration::from_millis(500))
        .run()
        .await
        .unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(4));
    assert_eq!(outcome.state, WatchdogState::TimedOut);
    assert!(outcome.result.tpv().is_none());
    let sky = outcome.result.sky_view().expect("sky latched");
    assert_eq!(sky.visible_count(), 2);
}

#[tokio::test]
async fn undecodable_lines_do_not_abort() {
    let script = format!(
        "echo 'gpspipe: warning' >&2; echo '{{broken'; echo '{SKY}'; echo 'trailing noise'; sleep 0.2; echo '{TPV}'; exec sleep 60"
    );

    let outcome = Harvester::new(sh(&script))
        .with_timeout(Duration::from_secs(10))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.state, WatchdogState::CompletedEarly);
    assert!(outcome.result.is_complete());
    // The stderr line travels a separate pipe and may lose the race.
    assert!(outcome.stats.lines_discarded >= 2);
}

#[tokio::test]
async fn stream_closing_early_yields_partial_result() {
    let script = format!("echo '{TPV}'");

    let outcome = Harvester::new(sh(&script))
        .with_timeout(Duration::from_secs(10))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.state, WatchdogState::SourceClosed);
    assert!(outcome.result.sky().is_none());
    assert!(outcome.result.tpv().is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn process_is_gone_after_harvest() {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let script = format!("echo '{SKY}'; exec sleep 60");
    let source = ProcessSource::spawn(&sh(&script)).unwrap();
    let pid = source.pid().expect("spawned process has a pid");

    let outcome = Harvester::new(["unused"])
        .with_timeout(Duration::from_millis(300))
        .run_with(source)
        .await
        .unwrap();

    assert_eq!(outcome.state, WatchdogState::TimedOut);
    // Reaped, so a signal-0 probe finds nothing.
    assert!(kill(Pid::from_raw(pid as i32), None).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn stubborn_process_is_killed_after_grace() {
    let script = format!("trap '' TERM; echo '{SKY}'; while true; do sleep 1; done");
    let start = Instant::now();

    let outcome = Harvester::new(sh(&script))
        .with_timeout(Duration::from_millis(300))
        .with_grace_period(Duration::from_millis(300))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.state, WatchdogState::TimedOut);
    assert!(outcome.result.sky().is_some());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn spawn_failure_is_an_error() {
    let result = Harvester::new(["nonexistent_command_12345"]).execute().await;
    assert!(result.is_err());
}
