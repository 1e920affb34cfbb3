use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BinUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl BinUnit {
    pub fn unit_ns(self) -> i64 {
        match self {
            Self::Second => 1_000_000_000,
            Self::Minute => 60 * 1_000_000_000,
            Self::Hour => 3_600 * 1_000_000_000,
            Self::Day => 86_400 * 1_000_000_000,
        }
    }
}

/// Index of the bucket `ts` falls into, for buckets of `width_ns` anchored
/// at `anchor`. Callers guarantee `ts >= anchor` (the anchor is the minimum
/// matched timestamp).
pub fn bucket_index(ts: DateTime<Utc>, anchor: DateTime<Utc>, width_ns: i64) -> i64 {
    let offset_ns = (ts - anchor).num_nanoseconds().unwrap_or(i64::MAX);
    offset_ns / width_ns
}

/// End boundary of bucket `index`: `anchor + width * (index + 1)`.
pub fn bucket_end(anchor: DateTime<Utc>, width_ns: i64, index: i64) -> DateTime<Utc> {
    let end_ns = width_ns.saturating_mul(index.saturating_add(1));
    anchor + chrono::Duration::nanoseconds(end_ns)
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| EngineError::Validation(format!("invalid duration {input}: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn indices_split_at_bucket_boundaries() {
        let anchor = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let width = BinUnit::Minute.unit_ns() * 5;

        let four_min = anchor + chrono::Duration::minutes(4);
        let six_min = anchor + chrono::Duration::minutes(6);
        assert_eq!(bucket_index(anchor, anchor, width), 0);
        assert_eq!(bucket_index(four_min, anchor, width), 0);
        assert_eq!(bucket_index(six_min, anchor, width), 1);

        let exactly_five = anchor + chrono::Duration::minutes(5);
        assert_eq!(bucket_index(exactly_five, anchor, width), 1);
    }

    #[test]
    fn bucket_end_is_exclusive_boundary() {
        let anchor = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let width = BinUnit::Second.unit_ns() * 30;
        assert_eq!(
            bucket_end(anchor, width, 0),
            anchor + chrono::Duration::seconds(30)
        );
        assert_eq!(
            bucket_end(anchor, width, 2),
            anchor + chrono::Duration::seconds(90)
        );
    }

    #[test]
    fn parses_duration() {
        assert_eq!(
            parse_duration_str("5m").unwrap(),
            Duration::from_secs(300)
        );
        assert!(parse_duration_str("nope").is_err());
    }
}
