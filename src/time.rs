//! # Time
//!
//! Conversions between the API's `Time`/`MicroTime` wrappers and `chrono`.
//!
//! Both wrappers serialize to RFC3339 strings, so conversions go through their
//! serde representation rather than the wrapped type.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// RFC3339 representation of an API timestamp
pub fn rfc3339<T: Serialize>(time: &T) -> Option<String> {
    match serde_json::to_value(time) {
        Ok(serde_json::Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Parse an API timestamp into UTC
pub fn to_utc<T: Serialize>(time: &T) -> Option<DateTime<Utc>> {
    rfc3339(time).and_then(|s| parse_rfc3339(&s))
}

/// Parse an RFC3339 string into UTC
#[must_use]
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build an API timestamp (`Time` or `MicroTime`) from a UTC instant
pub fn from_utc<T: DeserializeOwned>(instant: DateTime<Utc>) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(
        instant.to_rfc3339_opts(SecondsFormat::Micros, true),
    ))
}

/// Build an API timestamp from unix seconds
pub fn from_unix_seconds<T: DeserializeOwned>(seconds: i64) -> Result<T, serde_json::Error> {
    let instant = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        <serde_json::Error as serde::de::Error>::custom(format!(
            "unix timestamp {seconds} out of range"
        ))
    })?;
    from_utc(instant)
}
