// Duration normalization
//
// Backends report durations as float seconds, integer seconds, numeric
// strings, "M:SS"/"H:MM:SS" strings, or nothing at all. Everything is
// folded into a display string plus a seconds count.

use serde_json::Value;

use super::models::DurationInfo;

pub const ZERO_DISPLAY: &str = "0:00";

/// Duration as a backend reported it
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawDuration {
    #[default]
    Absent,
    Seconds(f64),
    Text(String),
}

impl From<Option<f64>> for RawDuration {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Absent, Self::Seconds)
    }
}

impl From<u64> for RawDuration {
    fn from(value: u64) -> Self {
        Self::Seconds(value as f64)
    }
}

impl From<&str> for RawDuration {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Option<&str>> for RawDuration {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Absent, Self::from)
    }
}

impl From<&Value> for RawDuration {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map_or(Self::Absent, Self::Seconds),
            Value::String(s) => Self::Text(s.clone()),
            _ => Self::Absent,
        }
    }
}

impl DurationInfo {
    pub fn zero() -> Self {
        Self {
            display: ZERO_DISPLAY.to_string(),
            seconds: 0,
        }
    }
}

pub fn normalize(raw: &RawDuration) -> DurationInfo {
    match raw {
        RawDuration::Absent => DurationInfo::zero(),
        RawDuration::Seconds(n) => from_seconds_f64(*n),
        RawDuration::Text(text) => normalize_text(text),
    }
}

fn normalize_text(text: &str) -> DurationInfo {
    let text = text.trim();
    if text.is_empty() || text == "None" {
        return DurationInfo::zero();
    }

    if text.contains(':') {
        return match colon_to_seconds(text) {
            Some(seconds) => DurationInfo {
                display: text.to_string(),
                seconds,
            },
            None => DurationInfo::zero(),
        };
    }

    match text.parse::<f64>() {
        Ok(n) => from_seconds_f64(n),
        Err(_) => DurationInfo::zero(),
    }
}

fn from_seconds_f64(n: f64) -> DurationInfo {
    if !n.is_finite() || n < 1.0 {
        return DurationInfo::zero();
    }
    from_seconds(n.floor() as u64)
}

pub fn from_seconds(total: u64) -> DurationInfo {
    DurationInfo {
        display: format_seconds(total),
        seconds: total,
    }
}

/// "M:SS" below an hour, "H:MM:SS" otherwise; zero renders the sentinel.
pub fn format_seconds(total: u64) -> String {
    if total == 0 {
        return ZERO_DISPLAY.to_string();
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Sum of components weighted by powers of 60 from the right.
pub fn colon_to_seconds(text: &str) -> Option<u64> {
    text.split(':').try_fold(0u64, |acc, part| {
        let part: u64 = part.trim().parse().ok()?;
        acc.checked_mul(60)?.checked_add(part)
    })
}
