use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Attribute;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanKind {
    #[default]
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Internal => "INTERNAL",
            Self::Server => "SERVER",
            Self::Client => "CLIENT",
            Self::Producer => "PRODUCER",
            Self::Consumer => "CONSUMER",
        }
    }
}

/// One timed operation within a distributed trace. Immutable once ingested.
///
/// `parent_span_id` is a weak reference: it may point at a span that was
/// never ingested or has been pruned, and lookups treat that as "unknown".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    pub span_id: String,
    pub trace_id: String,
    pub parent_span_id: Option<String>,
    pub operation_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Derived from the timestamps, stored redundantly for query speed.
    pub duration_ns: i64,
    /// 0 = unset, 1 = ok, 2 = error.
    pub status_code: i32,
    pub status_message: Option<String>,
    pub span_kind: SpanKind,
    pub instrumentation_library: Option<String>,
    pub service_name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl SpanRecord {
    /// Duration recomputed from the timestamps; the stored `duration_ns`
    /// field is refreshed from this at ingestion.
    pub fn computed_duration_ns(&self) -> i64 {
        (self.end_time - self.start_time)
            .num_nanoseconds()
            .unwrap_or(i64::MAX)
    }

    pub fn attr_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn duration_matches_timestamps() {
        let start = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let span = SpanRecord {
            span_id: "s1".into(),
            trace_id: "t1".into(),
            parent_span_id: None,
            operation_name: "GET /orders".into(),
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(30),
            duration_ns: 0,
            status_code: 1,
            status_message: None,
            span_kind: SpanKind::Server,
            instrumentation_library: None,
            service_name: Some("api".into()),
            attributes: vec![],
        };
        assert_eq!(span.computed_duration_ns(), 30_000_000);
    }

    #[test]
    fn span_kind_serializes_uppercase() {
        let json = serde_json::to_string(&SpanKind::Server).unwrap();
        assert_eq!(json, "\"SERVER\"");
    }

    #[test]
    fn repeated_attribute_keys_are_all_visible() {
        let start = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let span = SpanRecord {
            span_id: "s1".into(),
            trace_id: "t1".into(),
            parent_span_id: None,
            operation_name: "op".into(),
            start_time: start,
            end_time: start,
            duration_ns: 0,
            status_code: 0,
            status_message: None,
            span_kind: SpanKind::default(),
            instrumentation_library: None,
            service_name: None,
            attributes: vec![
                Attribute::new("tag", "a"),
                Attribute::new("tag", "b"),
                Attribute::new("peer", "redis:6379"),
            ],
        };
        let tags: Vec<_> = span.attr_values("tag").collect();
        assert_eq!(tags, vec!["a", "b"]);
    }
}
