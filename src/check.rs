//! Checkmk local-check rendering of a harvest snapshot.
//!
//! Each line has the form `<status> "<service>" <metrics> <summary>`, where
//! `P` lets Checkmk derive the state from the metric thresholds.

use std::fmt;

use crate::model::{FixMode, HarvestResult};

/// Upper bound used for the satellites metric range.
const MAX_SATELLITES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warn,
    Crit,
    Unknown,
    /// Computed by Checkmk from the metric thresholds.
    Dynamic,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Ok => "0",
            Self::Warn => "1",
            Self::Crit => "2",
            Self::Unknown => "3",
            Self::Dynamic => "P",
        };
        f.write_str(code)
    }
}

/// One local-check output line.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckLine {
    pub status: CheckStatus,
    pub service: String,
    /// Perfdata, `-` when the service has none
    pub metrics: String,
    pub summary: String,
}

impl CheckLine {
    pub fn new(
        status: CheckStatus,
        service: impl Into<String>,
        metrics: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            status,
            service: service.into(),
            metrics: metrics.into(),
            summary: summary.into(),
        }
    }
}

impl fmt::Display for CheckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" {} {}",
            self.status, self.service, self.metrics, self.summary
        )
    }
}

/// Renders the GPS services for `result`. Missing slots produce the
/// "unknown" variants rather than being skipped, so the services never go
/// stale in Checkmk.
pub fn render(result: &HarvestResult) -> Vec<CheckLine> {
    let mut lines = Vec::with_capacity(6);

    match result.sky_view() {
        Some(sky) => {
            let device = sky.device.as_deref().unwrap_or("UNKNOWN");
            let (used, visible) = (sky.used_count(), sky.visible_count());
            lines.push(CheckLine::new(
                CheckStatus::Ok,
                "GPS source",
                "-",
                format!("Device used to acquire source data: {device}"),
            ));
            lines.push(CheckLine::new(
                CheckStatus::Dynamic,
                "GPS satellites",
                format!("used={used};4:;2:;0;{MAX_SATELLITES}|visible={visible}"),
                format!("Used Satellites: {used}, Visible Satellites: {visible}"),
            ));
        }
        None => {
            lines.push(CheckLine::new(
                CheckStatus::Crit,
                "GPS source",
                "-",
                "Device used to acquire source data: UNKNOWN",
            ));
            lines.push(CheckLine::new(
                CheckStatus::Dynamic,
                "GPS satellites",
                format!("used=0;4:;2:;0;{MAX_SATELLITES}|visible=0"),
                "Used Satellites: NONE",
            ));
        }
    }

    match result.tpv_view() {
        Some(tpv) => {
            lines.push(CheckLine::new(
                CheckStatus::Dynamic,
                "GPS lock",
                format!("mode={};2:;1:;0;3", tpv.mode),
                lock_summary(tpv.fix_mode()),
            ));
            lines.push(CheckLine::new(
                CheckStatus::Ok,
                "GPS location",
                format!("lat={}|lon={}", tpv.lat, tpv.lon),
                format!("GPS Coordinates: {}, {}", tpv.lat, tpv.lon),
            ));
            if let Some(alt) = tpv.alt_hae {
                lines.push(CheckLine::new(
                    CheckStatus::Ok,
                    "GPS altitude",
                    format!("altitude={alt}meters"),
                    format!("GPS Altitude: {alt} meters"),
                ));
            }
            if let Some(time) = &tpv.time {
                lines.push(CheckLine::new(
                    CheckStatus::Ok,
                    "GPS fix",
                    format!("time={time}"),
                    format!("GPS Fix Timestamp: {time}"),
                ));
            }
        }
        None => lines.push(CheckLine::new(
            CheckStatus::Dynamic,
            "GPS lock",
            "mode=0;2:;1:;0;3",
            lock_summary(FixMode::NoFix),
        )),
    }

    lines
}

fn lock_summary(mode: FixMode) -> &'static str {
    match mode {
        FixMode::Unknown => "Unknown GPS Status",
        FixMode::NoFix => "No GPS Lock Available",
        FixMode::TwoD => "2D GPS Lock",
        FixMode::ThreeD => "3D GPS Lock",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, Slot, Slots};

    fn result(lines: &[&str]) -> HarvestResult {
        let mut slots = Slots::default();
        for line in lines {
            let record = Record::parse(line).unwrap();
            let slot = if record.class == "SKY" { Slot::Sky } else { Slot::Tpv };
            slots.latch(slot, record);
        }
        slots.into_result()
    }

    #[test]
    fn test_render_full_snapshot() {
        let result = result(&[
            r#"{"class":"SKY","device":"/dev/ttyU0","satellites":[{"used":true},{"used":false}]}"#,
            r#"{"class":"TPV","lat":1.5,"lon":2.25,"mode":3,"altHAE":10.5,"time":"2026-10-19T08:00:00.000Z"}"#,
        ]);
        let rendered: Vec<String> = render(&result).iter().map(ToString::to_string).collect();

        assert_eq!(
            rendered,
            vec![
                r#"0 "GPS source" - Device used to acquire source data: /dev/ttyU0"#,
                r#"P "GPS satellites" used=1;4:;2:;0;32|visible=2 Used Satellites: 1, Visible Satellites: 2"#,
                r#"P "GPS lock" mode=3;2:;1:;0;3 3D GPS Lock"#,
                r#"0 "GPS location" lat=1.5|lon=2.25 GPS Coordinates: 1.5, 2.25"#,
                r#"0 "GPS altitude" altitude=10.5meters GPS Altitude: 10.5 meters"#,
                r#"0 "GPS fix" time=2026-10-19T08:00:00.000Z GPS Fix Timestamp: 2026-10-19T08:00:00.000Z"#,
            ]
        );
    }

    #[test]
    fn test_render_empty_snapshot() {
        let rendered: Vec<String> = render(&HarvestResult::default())
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            rendered,
            vec![
                r#"2 "GPS source" - Device used to acquire source data: UNKNOWN"#,
                r#"P "GPS satellites" used=0;4:;2:;0;32|visible=0 Used Satellites: NONE"#,
                r#"P "GPS lock" mode=0;2:;1:;0;3 No GPS Lock Available"#,
            ]
        );
    }

    #[test]
    fn test_render_tpv_without_optional_fields() {
        let result = result(&[r#"{"class":"TPV","lat":1.0,"lon":2.0,"mode":1}"#]);
        let lines = render(&result);

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2].summary, "No GPS Lock Available");
        assert_eq!(lines[3].service, "GPS location");
    }
}
