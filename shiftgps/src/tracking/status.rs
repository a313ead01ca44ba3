//! Status text rendering for the tracking notification.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::notify::StatusText;
use crate::time::since;

const TRACKING_TITLE: &str = "Shift tracking active";
const GPS_LOST_TITLE: &str = "GPS signal lost";

/// What the tracking notification shows.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Start of the shift, or of the engine when unknown.
    pub tracking_since: DateTime<Utc>,
    pub point_count: u64,
    pub last_capture: Option<DateTime<Utc>>,
    /// Meters per second.
    pub speed: Option<f64>,
    pub is_stationary: bool,
}

/// Normal tracking text.
pub fn tracking_status(snapshot: &StatusSnapshot, now: DateTime<Utc>) -> StatusText {
    let mut parts = vec![
        format!("{} elapsed", format_elapsed(since(now, snapshot.tracking_since))),
        match snapshot.point_count {
            1 => "1 point".to_string(),
            n => format!("{} points", n),
        },
    ];

    if let Some(at) = snapshot.last_capture {
        parts.push(format!("last {}", at.format("%H:%M:%S")));
    }
    if snapshot.is_stationary {
        parts.push("stationary".to_string());
    } else if let Some(speed) = snapshot.speed {
        parts.push(format!("{:.0} km/h", speed * 3.6));
    }

    StatusText::new(TRACKING_TITLE, parts.join(" | "))
}

/// Banner shown while a GPS gap is open.
pub fn gps_lost_status(lost_for: Duration) -> StatusText {
    StatusText::new(
        GPS_LOST_TITLE,
        format!(
            "No location for {}. Tracking resumes when the signal returns.",
            format_elapsed(lost_for)
        ),
    )
}

/// `1h 05m`, `12m`, `45s`.
fn format_elapsed(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", secs)
    }
}
