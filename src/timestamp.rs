use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Layouts tried after RFC 3339, in order. The API mixes colon and
/// no-colon UTC offsets, and occasionally omits the offset entirely.
const OFFSET_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const NAIVE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Instant reported by the API, normalized to UTC.
///
/// Serializes as RFC 3339 with a `Z` suffix and the shortest of 0, 3, 6 or
/// 9 fractional digits that represents the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized timestamp '{0}'")]
pub struct TimestampError(String);

impl Timestamp {
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        let trimmed = value.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, OFFSET_LAYOUT) {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, NAIVE_LAYOUT) {
            return Ok(Self(parsed.and_utc()));
        }
        Err(TimestampError(value.to_owned()))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}
