use chrono::{DateTime, Duration, TimeZone, Utc};
use tracelens_core::model::Attribute;
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::span::{SpanKind, SpanRecord};
use uuid::Uuid;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

/// Span with start/end given as millisecond offsets from `base_time`.
pub fn span_at(
    trace_id: &str,
    span_id: &str,
    parent: Option<&str>,
    start_ms: i64,
    end_ms: i64,
) -> SpanRecord {
    SpanRecord {
        span_id: span_id.to_string(),
        trace_id: trace_id.to_string(),
        parent_span_id: parent.map(str::to_string),
        operation_name: format!("op-{span_id}"),
        start_time: base_time() + Duration::milliseconds(start_ms),
        end_time: base_time() + Duration::milliseconds(end_ms),
        duration_ns: (end_ms - start_ms) * 1_000_000,
        status_code: 1,
        status_message: None,
        span_kind: SpanKind::Internal,
        instrumentation_library: None,
        service_name: Some("api".to_string()),
        attributes: Vec::new(),
    }
}

/// Log at a millisecond offset from `base_time`.
pub fn log_at(
    trace_id: Option<&str>,
    span_id: Option<&str>,
    at_ms: i64,
    severity: i32,
    body: &str,
) -> LogRecord {
    LogRecord {
        log_id: Uuid::new_v4(),
        trace_id: trace_id.map(str::to_string),
        span_id: span_id.map(str::to_string),
        timestamp: base_time() + Duration::milliseconds(at_ms),
        observed_timestamp: Some(base_time() + Duration::milliseconds(at_ms + 3)),
        severity_number: severity,
        severity_text: None,
        body: Some(body.to_string()),
        service_name: Some("api".to_string()),
        instrumentation_library: None,
        attributes: Vec::new(),
    }
}

/// A failed request: root span with a slow redis child, plus the two logs
/// the child emitted.
pub fn sample_trace(trace_id: &str) -> (Vec<SpanRecord>, Vec<LogRecord>) {
    let mut root = span_at(trace_id, "root", None, 0, 1800);
    root.operation_name = "GET /v1/orders".to_string();
    root.span_kind = SpanKind::Server;
    root.status_code = 2;
    root.status_message = Some("upstream timeout".to_string());

    let mut child = span_at(trace_id, "child", Some("root"), 900, 1600);
    child.operation_name = "cache.get redis".to_string();
    child.span_kind = SpanKind::Client;
    child.status_code = 2;
    child.attributes = vec![Attribute::new("peer", "redis:6379")];

    let mut retry = log_at(Some(trace_id), Some("child"), 950, 13, "retrying attempt=2");
    retry.attributes = vec![Attribute::new("attempt", "2")];

    let mut failure = log_at(
        Some(trace_id),
        Some("child"),
        1200,
        17,
        "context deadline exceeded",
    );
    failure.attributes = vec![Attribute::new("peer", "redis:6379")];

    (vec![root, child], vec![retry, failure])
}
