//! Creation timestamps.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Wire format of every timestamp: 26 chars, sortable as a string.
pub const TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A point in time, stored in its string form.
///
/// Ordering is plain string ordering, which agrees with chronological
/// ordering because the format is fixed-width.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(String);

impl Timestamp {
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self(dt.format(TIMESTAMP_FMT).to_string())
    }

    pub fn parse(s: &str) -> Result<Self> {
        let dt = NaiveDateTime::parse_from_str(s, TIMESTAMP_FMT)
            .map_err(|e| Error::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self::from_datetime(dt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_datetime(&self) -> NaiveDateTime {
        // The only constructors go through TIMESTAMP_FMT.
        NaiveDateTime::parse_from_str(&self.0, TIMESTAMP_FMT)
            .unwrap_or(DateTime::<Utc>::MIN_UTC.naive_utc())
    }
}

impl TryFrom<String> for Timestamp {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strictly increasing clock.
///
/// Two calls never return the same value: if the wall clock has not moved
/// past the last issued instant, the clock advances by one microsecond.
#[derive(Debug, Default)]
pub struct Clock {
    last: Mutex<Option<NaiveDateTime>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        let wall = Utc::now().naive_utc();
        // Drop sub-microsecond precision so the string form round-trips.
        let wall = wall - TimeDelta::nanoseconds(i64::from(wall.and_utc().timestamp_subsec_nanos() % 1_000));

        let mut last = self.last.lock();
        let next = match *last {
            Some(prev) if wall <= prev => prev + TimeDelta::microseconds(1),
            _ => wall,
        };
        *last = Some(next);
        Timestamp::from_datetime(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_is_fixed_width() {
        let clock = Clock::new();
        let ts = clock.now();
        assert_eq!(ts.as_str().len(), 26);
        assert_eq!(&ts.as_str()[10..11], "T");
    }

    #[test]
    fn test_strictly_increasing() {
        let clock = Clock::new();
        let mut prev = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > prev, "{next} should be after {prev}");
            prev = next;
        }
    }

    #[test]
    fn test_parse_roundtrip() {
        let ts = Timestamp::parse("2016-01-02T03:04:05.000006").unwrap();
        assert_eq!(ts.as_str(), "2016-01-02T03:04:05.000006");
        assert_eq!(Timestamp::from_datetime(ts.to_datetime()), ts);
        assert!(Timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ts: Timestamp = serde_json::from_str("\"2016-01-02T03:04:05.000006\"").unwrap();
        assert_eq!(ts.as_str(), "2016-01-02T03:04:05.000006");
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"2016-01-02T03:04:05.000006\"");

        assert!(serde_json::from_str::<Timestamp>("\"garbage\"").is_err());
        assert!(serde_json::from_str::<Timestamp>("\"\"").is_err());
    }
}
