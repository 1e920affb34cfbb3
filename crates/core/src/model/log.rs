use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Attribute;

/// One log record. `trace_id`/`span_id` are weak references: a log may point
/// at a trace or span that was never ingested or has been pruned.
///
/// `observed_timestamp` is the ingestion-side receipt time; clock skew means
/// it is not guaranteed to be >= `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub log_id: Uuid,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub observed_timestamp: Option<DateTime<Utc>>,
    pub severity_number: i32,
    pub severity_text: Option<String>,
    pub body: Option<String>,
    pub service_name: Option<String>,
    pub instrumentation_library: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl LogRecord {
    /// The display label: `severity_text` overrides the numeric mapping
    /// when present.
    pub fn severity_label(&self) -> &str {
        self.severity_text
            .as_deref()
            .unwrap_or_else(|| severity_label(self.severity_number))
    }

    pub fn attr_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Label for a numeric severity: >=17 error, 13-16 warn, 9-12 info, <9 debug.
pub fn severity_label(level: i32) -> &'static str {
    match level {
        17.. => "ERROR",
        13..=16 => "WARN",
        9..=12 => "INFO",
        _ => "DEBUG",
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn log(severity: i32, text: Option<&str>) -> LogRecord {
        LogRecord {
            log_id: Uuid::nil(),
            trace_id: None,
            span_id: None,
            timestamp: chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            observed_timestamp: None,
            severity_number: severity,
            severity_text: text.map(str::to_string),
            body: None,
            service_name: None,
            instrumentation_library: None,
            attributes: vec![],
        }
    }

    #[test]
    fn numeric_severity_thresholds() {
        assert_eq!(severity_label(21), "ERROR");
        assert_eq!(severity_label(17), "ERROR");
        assert_eq!(severity_label(16), "WARN");
        assert_eq!(severity_label(13), "WARN");
        assert_eq!(severity_label(12), "INFO");
        assert_eq!(severity_label(9), "INFO");
        assert_eq!(severity_label(8), "DEBUG");
        assert_eq!(severity_label(-3), "DEBUG");
    }

    #[test]
    fn severity_text_overrides_number() {
        assert_eq!(log(17, None).severity_label(), "ERROR");
        assert_eq!(log(17, Some("CRITICAL")).severity_label(), "CRITICAL");
    }
}
