use std::sync::Arc;

use tracelens_core::error::{EngineError, Result};
use tracelens_core::ids::{SpanId, TraceId};
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::query::{IngestReport, RejectedRecord};

use crate::Store;

impl Store {
    /// Validates and publishes one span. The duplicate check and the insert
    /// happen under a single write-lock hold, so a span is either fully
    /// visible (record + both indexes) or not at all.
    pub fn insert_span(&self, span: SpanRecord) -> Result<()> {
        let span = normalize_span(span)?;

        let mut inner = self.write();
        if inner.span_ids.contains_key(&span.span_id) {
            return Err(EngineError::Validation(format!(
                "duplicate span_id: {}",
                span.span_id
            )));
        }
        let slot = inner.spans.len();
        inner.span_ids.insert(span.span_id.clone(), slot);
        inner
            .traces
            .entry(span.trace_id.clone())
            .or_default()
            .push(slot);
        inner.spans.push(Arc::new(span));
        Ok(())
    }

    /// Batch ingest: a bad record is rejected individually and never aborts
    /// the rest of the batch.
    pub fn insert_spans(&self, spans: Vec<SpanRecord>) -> IngestReport {
        let mut report = IngestReport::default();
        for (index, span) in spans.into_iter().enumerate() {
            match self.insert_span(span) {
                Ok(()) => report.accepted += 1,
                Err(e) => report.rejected.push(RejectedRecord {
                    index,
                    message: e.to_string(),
                }),
            }
        }
        report
    }

    /// Logs have no uniqueness constraint beyond carrying an id; a
    /// well-formed record always lands.
    pub fn insert_log(&self, log: LogRecord) {
        let log = normalize_log(log);
        self.write().logs.push(Arc::new(log));
    }

    pub fn insert_logs(&self, logs: Vec<LogRecord>) -> IngestReport {
        let mut report = IngestReport::default();
        for log in logs {
            self.insert_log(log);
            report.accepted += 1;
        }
        report
    }
}

fn normalize_span(mut span: SpanRecord) -> Result<SpanRecord> {
    TraceId::parse(&span.trace_id)?;
    SpanId::parse(&span.span_id)?;
    if span.end_time < span.start_time {
        return Err(EngineError::Validation(format!(
            "span {}: end_time precedes start_time",
            span.span_id
        )));
    }
    // An empty parent on the wire means "no parent".
    if span.parent_span_id.as_deref() == Some("") {
        span.parent_span_id = None;
    }
    span.duration_ns = span.computed_duration_ns();
    Ok(span)
}

fn normalize_log(mut log: LogRecord) -> LogRecord {
    if log.trace_id.as_deref() == Some("") {
        log.trace_id = None;
    }
    if log.span_id.as_deref() == Some("") {
        log.span_id = None;
    }
    log
}

#[cfg(test)]
mod tests {
    use testkit::{base_time, sample_trace, span_at};

    use super::*;

    #[test]
    fn insert_then_lookup_by_trace() {
        let store = Store::new();
        let (spans, _) = sample_trace("t1");
        let expected = spans.len();
        let report = store.insert_spans(spans);
        assert_eq!(report.accepted, expected);
        assert!(report.rejected.is_empty());

        let got = store.get_spans_by_trace("t1");
        assert_eq!(got.len(), expected);
    }

    #[test]
    fn duplicate_span_id_is_rejected() {
        let store = Store::new();
        let span = span_at("t1", "s1", None, 0, 10);
        store.insert_span(span.clone()).unwrap();
        let err = store.insert_span(span).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn inverted_timestamps_are_rejected() {
        let store = Store::new();
        let mut span = span_at("t1", "s1", None, 10, 20);
        span.end_time = span.start_time - chrono::Duration::milliseconds(1);
        assert!(store.insert_span(span).is_err());
    }

    #[test]
    fn batch_rejects_only_offenders() {
        let store = Store::new();
        let good1 = span_at("t1", "s1", None, 0, 10);
        let dup = span_at("t1", "s1", None, 0, 10);
        let mut inverted = span_at("t1", "s3", None, 10, 20);
        inverted.end_time = inverted.start_time - chrono::Duration::milliseconds(1);
        let good2 = span_at("t1", "s4", None, 5, 8);

        let report = store.insert_spans(vec![good1, dup, inverted, good2]);
        assert_eq!(report.accepted, 2);
        let rejected: Vec<usize> = report.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, vec![1, 2]);
        assert_eq!(store.get_spans_by_trace("t1").len(), 2);
    }

    #[test]
    fn duration_is_recomputed_on_insert() {
        let store = Store::new();
        let mut span = span_at("t1", "s1", None, 0, 25);
        span.duration_ns = 1; // stale client-side value
        store.insert_span(span).unwrap();
        let got = store.get_spans_by_trace("t1");
        assert_eq!(got[0].duration_ns, 25_000_000);
    }

    #[test]
    fn empty_parent_becomes_none() {
        let store = Store::new();
        let mut span = span_at("t1", "s1", None, 0, 10);
        span.parent_span_id = Some(String::new());
        store.insert_span(span).unwrap();
        assert_eq!(store.get_spans_by_trace("t1")[0].parent_span_id, None);
    }

    #[test]
    fn empty_ids_are_rejected() {
        let store = Store::new();
        let mut span = span_at("t1", "s1", None, 0, 10);
        span.span_id = String::new();
        assert!(store.insert_span(span).is_err());

        let mut span = span_at("t1", "s1", None, 0, 10);
        span.trace_id = String::new();
        assert!(store.insert_span(span).is_err());
    }

    #[test]
    fn logs_always_land_and_dangling_refs_survive() {
        let store = Store::new();
        let (_, logs) = sample_trace("never-ingested-trace");
        let report = store.insert_logs(logs);
        assert_eq!(report.accepted, 2);
        assert!(report.rejected.is_empty());
        assert_eq!(store.status().logs_count, 2);
    }

    #[test]
    fn insert_is_visible_to_snapshot_readers() {
        let store = Store::new();
        store
            .insert_span(span_at("t1", "s1", None, 0, 10))
            .unwrap();
        let status = store.status();
        assert_eq!(status.spans_count, 1);
        assert_eq!(status.oldest_span_start, Some(base_time()));
    }
}
