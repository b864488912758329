use crate::ReportError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parse an RFC3339 instant.
pub fn parse_rfc3339(time: &str) -> Result<DateTime<FixedOffset>, ReportError> {
    DateTime::parse_from_rfc3339(time).map_err(|_| ReportError::InvalidTimestamp(time.to_string()))
}

/// Convert an RFC3339 instant to Unix milliseconds, the unit the portal API expects.
pub fn to_unix_millis(time: &str) -> Result<i64, ReportError> {
    Ok(parse_rfc3339(time)?.timestamp_millis())
}

/// Build the full instant of a log line from its date and time-of-day parts.
///
/// No validation happens here: a missing date yields `T<time>Z`, which only
/// fails once a sink tries to convert it.
pub fn synthesize(date: &str, time_of_day: &str) -> String {
    format!("{date}T{time_of_day}Z")
}

/// Test duration as reported by an end line, e.g. `5.56` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elapsed {
    raw: String,
    duration: Duration,
    millis: i64,
}

impl Elapsed {
    /// Rejects text that is not a number of seconds, and values too large
    /// to express as whole milliseconds.
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let invalid = || ReportError::InvalidDuration(raw.to_string());

        let seconds: f64 = raw.parse().map_err(|_| invalid())?;
        let duration = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
        let millis = i64::try_from(duration.as_millis()).map_err(|_| invalid())?;
        Ok(Self { raw: raw.to_string(), duration, millis })
    }

    /// The duration text exactly as it appeared in the log.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_duration(&self) -> Duration {
        self.duration
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }
}
