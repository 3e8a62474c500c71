//! Output format implementations

use serde::Serialize;
use std::time::Duration;

use crate::config::DisplayConfig;
use crate::direction::{DirectionSnapshot, TrackerStatus, MAX_AZIMUTH};

/// JSON output structure
#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    time_ms: Option<u64>,
    #[serde(flatten)]
    snapshot: &'a DirectionSnapshot,
}

/// Coarse direction name for an azimuth
pub fn direction_label(azimuth: f32, deadband: f32) -> &'static str {
    if azimuth > deadband {
        "front-right"
    } else if azimuth < -deadband {
        "front-left"
    } else {
        "front"
    }
}

/// Horizontal needle gauge: `|` marks straight ahead, `*` the azimuth
pub fn compass_gauge(azimuth: f32, width: usize) -> String {
    let width = width.max(3);
    let center = width / 2;
    let span = (width - 1) as f32;
    let position = (((azimuth.clamp(-MAX_AZIMUTH, MAX_AZIMUTH) + MAX_AZIMUTH) / (2.0 * MAX_AZIMUTH))
        * span)
        .round() as usize;

    let needle: String = (0..width)
        .map(|i| {
            if i == position {
                '*'
            } else if i == center {
                '|'
            } else {
                '-'
            }
        })
        .collect();

    format!("[{}]", needle)
}

/// Format as a single compass line
pub fn format_text(snapshot: &DirectionSnapshot, config: &DisplayConfig) -> String {
    // No angle or gauge until there is a reading to show
    if snapshot.updates == 0 {
        let status = match snapshot.status {
            TrackerStatus::DeviceUnavailable => "device unavailable, waiting for audio...",
            _ => "waiting for audio...",
        };
        return status.to_string();
    }

    let reading = &snapshot.reading;
    let headline = if snapshot.status == TrackerStatus::DeviceUnavailable {
        "device unavailable (held)"
    } else if !reading.active {
        "no clear directional sound"
    } else {
        direction_label(reading.azimuth, config.center_deadband_deg)
    };

    format!(
        "{:<26} {:+6.1}°  level {:.3}  {}",
        headline,
        reading.azimuth,
        reading.level,
        compass_gauge(reading.azimuth, config.gauge_width)
    )
}

/// Format as a compass line prefixed with a timestamp
pub fn format_text_at(at: Duration, snapshot: &DirectionSnapshot, config: &DisplayConfig) -> String {
    format!("[{}] {}", format_timestamp(at), format_text(snapshot, config))
}

/// Format as JSON
pub fn format_json(snapshot: &DirectionSnapshot) -> String {
    json_line(None, snapshot)
}

/// Format as JSON with a `time_ms` field
pub fn format_json_at(at: Duration, snapshot: &DirectionSnapshot) -> String {
    json_line(Some(at.as_millis() as u64), snapshot)
}

fn json_line(time_ms: Option<u64>, snapshot: &DirectionSnapshot) -> String {
    let output = JsonOutput { time_ms, snapshot };
    serde_json::to_string(&output).unwrap_or_else(|_| {
        format!(
            "{{\"azimuth\": {}, \"updates\": {}}}",
            snapshot.reading.azimuth, snapshot.updates
        )
    })
}

/// Format a position as `MM:SS.mmm`
pub fn format_timestamp(at: Duration) -> String {
    let ms = at.as_millis();
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::DirectionReading;

    fn snapshot(azimuth: f32, level: f32, active: bool) -> DirectionSnapshot {
        DirectionSnapshot {
            reading: DirectionReading {
                azimuth,
                confidence: azimuth.abs() / 90.0,
                level,
                active,
                held: false,
            },
            status: TrackerStatus::Listening,
            updates: 1,
        }
    }

    #[test]
    fn test_direction_label() {
        assert_eq!(direction_label(25.0, 10.0), "front-right");
        assert_eq!(direction_label(-25.0, 10.0), "front-left");
        assert_eq!(direction_label(10.0, 10.0), "front");
        assert_eq!(direction_label(-3.0, 10.0), "front");
    }

    #[test]
    fn test_compass_gauge() {
        assert_eq!(compass_gauge(0.0, 11), "[-----*-----]");
        assert_eq!(compass_gauge(-90.0, 11), "[*----|-----]");
        assert_eq!(compass_gauge(90.0, 11), "[-----|----*]");
        assert_eq!(compass_gauge(45.0, 11), "[-----|--*--]");
        // out-of-range input pins to the edge
        assert_eq!(compass_gauge(400.0, 11), "[-----|----*]");
    }

    #[test]
    fn test_format_text_active() {
        let config = DisplayConfig::default();
        let line = format_text(&snapshot(34.5, 0.123, true), &config);
        assert!(line.starts_with("front-right"));
        assert!(line.contains("+34.5°"));
        assert!(line.contains("level 0.123"));
    }

    #[test]
    fn test_format_text_states() {
        let config = DisplayConfig::default();

        let waiting = DirectionSnapshot::default();
        assert_eq!(format_text(&waiting, &config), "waiting for audio...");

        let quiet = format_text(&snapshot(-12.0, 0.001, false), &config);
        assert!(quiet.starts_with("no clear directional sound"));

        let unavailable = DirectionSnapshot {
            status: TrackerStatus::DeviceUnavailable,
            ..Default::default()
        };
        let line = format_text(&unavailable, &config);
        assert_eq!(line, "device unavailable, waiting for audio...");
        assert!(!line.contains('°'));
        assert!(!line.contains('['));

        let mut lost = snapshot(-40.0, 0.2, true);
        lost.status = TrackerStatus::DeviceUnavailable;
        let line = format_text(&lost, &config);
        assert!(line.starts_with("device unavailable"));
        assert!(line.contains("-40.0°"));
    }

    #[test]
    fn test_format_json() {
        let json = format_json(&snapshot(-45.0, 0.5, true));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["azimuth"], -45.0);
        assert_eq!(value["active"], true);
        assert_eq!(value["status"], "listening");
        assert_eq!(value["updates"], 1);
        assert!(value.get("time_ms").is_none());

        let json = format_json_at(Duration::from_millis(1500), &snapshot(0.0, 0.0, false));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["time_ms"], 1500);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Duration::from_millis(0)), "00:00.000");
        assert_eq!(format_timestamp(Duration::from_millis(61_234)), "01:01.234");
    }
}
