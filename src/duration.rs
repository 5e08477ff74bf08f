use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// A duration string that does not follow the ISO 8601 "PT#H#M#S" shape.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed duration string: {0:?}")]
pub struct MalformedDuration(pub String);

// ISO 8601 duration with whole-number designators
// e.g., PT4M13S, PT1H2M3S, P1DT2H
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^P
        (?:(?P<day>\d+)D)?
        (?:T
            (?:(?P<hour>\d+)H)?
            (?:(?P<min>\d+)M)?
            (?:(?P<sec>\d+)S)?
        )?$",
    )
    .unwrap()
});

fn malformed(raw: &str) -> MalformedDuration {
    MalformedDuration(raw.to_string())
}

fn capture_field(caps: &regex::Captures, name: &str, raw: &str) -> Result<i64, MalformedDuration> {
    match caps.name(name) {
        Some(m) => m.as_str().parse::<i64>().map_err(|_| malformed(raw)),
        None => Ok(0),
    }
}

/// Convert an ISO 8601 duration string into whole milliseconds.
/// At least one designator is required ("PT" alone does not name a duration),
/// and any value that overflows a millisecond count is rejected.
pub fn to_millis(raw: &str) -> Result<i64, MalformedDuration> {
    let caps = DURATION_RE
        .captures(raw.trim())
        .ok_or_else(|| malformed(raw))?;
    if ["day", "hour", "min", "sec"]
        .into_iter()
        .all(|g| caps.name(g).is_none())
    {
        return Err(malformed(raw));
    }

    let days = capture_field(&caps, "day", raw)?;
    let hours = capture_field(&caps, "hour", raw)?;
    let minutes = capture_field(&caps, "min", raw)?;
    let seconds = capture_field(&caps, "sec", raw)?;

    days.checked_mul(24)
        .and_then(|h| h.checked_add(hours))
        .and_then(|h| h.checked_mul(60))
        .and_then(|m| m.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .ok_or_else(|| malformed(raw))
}

/// Absent input stays absent; present input must parse.
pub fn normalize(raw: Option<&str>) -> Result<Option<i64>, MalformedDuration> {
    match raw {
        Some(s) => to_millis(s).map(Some),
        None => Ok(None),
    }
}
