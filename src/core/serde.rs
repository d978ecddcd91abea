use serde::{de, Serialize, Deserialize, Serializer, Deserializer};
use std::time::Duration;
use chrono::{DateTime, Local};

/// Serializes Duration as fractional seconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs_f64().serialize(serializer)
}

/// Deserializes Duration from fractional seconds, rounded to the nanosecond
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(de::Error::custom(format!("invalid duration: {} seconds", secs)));
    }
    let nanos = (secs * 1e9).round();
    if nanos >= u64::MAX as f64 {
        return Err(de::Error::custom(format!("duration out of range: {} seconds", secs)));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

/// Serializes a local timestamp as RFC 3339
pub fn serialize_timestamp<S>(time: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    time.to_rfc3339().serialize(serializer)
}
