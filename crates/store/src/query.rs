use std::collections::BTreeSet;
use std::sync::Arc;

use tracelens_core::cancel::Cancel;
use tracelens_core::error::Result;
use tracelens_core::filter::{self, Filter};
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::model::trace::TraceView;
use tracelens_core::query::TraceSearchRequest;

use crate::Store;

/// Records scanned between cancellation checks.
pub(crate) const CANCEL_EVERY: u32 = 256;

impl Store {
    /// All spans sharing `trace_id`, in insertion order. Order is
    /// unspecified to callers; trace assembly sorts what it needs.
    pub fn get_spans_by_trace(&self, trace_id: &str) -> Vec<SpanRecord> {
        let inner = self.read();
        inner
            .traces
            .get(trace_id)
            .map(|slots| slots.iter().map(|&i| (*inner.spans[i]).clone()).collect())
            .unwrap_or_default()
    }

    /// Derived trace view, None when no span carries the id.
    pub fn trace_view(&self, trace_id: &str) -> Option<TraceView> {
        let inner = self.read();
        let slots = inner.traces.get(trace_id)?;
        TraceView::from_spans(trace_id, slots.iter().map(|&i| inner.spans[i].as_ref()))
    }

    /// Traces whose constituent spans match the request, expanded to views,
    /// most recent first, paged by offset/limit.
    pub fn list_traces(
        &self,
        req: &TraceSearchRequest,
        cancel: &Cancel,
    ) -> Result<Vec<TraceView>> {
        cancel.check()?;

        let groups: Vec<(String, Vec<Arc<SpanRecord>>)> = {
            let inner = self.read();
            inner
                .traces
                .iter()
                .map(|(id, slots)| {
                    let spans = slots.iter().map(|&i| Arc::clone(&inner.spans[i])).collect();
                    (id.clone(), spans)
                })
                .collect()
        };

        let mut ticker = cancel.ticker(CANCEL_EVERY);
        let mut views = Vec::new();
        for (trace_id, spans) in &groups {
            ticker.tick()?;
            if !spans.iter().any(|s| req.matches_span(s)) {
                continue;
            }
            if let Some(view) = TraceView::from_spans(trace_id, spans.iter().map(Arc::as_ref)) {
                views.push(view);
            }
        }

        views.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| b.trace_id.cmp(&a.trace_id))
        });

        let offset = req.offset.unwrap_or(0);
        let limit = req.limit.unwrap_or(usize::MAX);
        Ok(views.into_iter().skip(offset).take(limit).collect())
    }

    /// Flat span listing, most recent first (ties keep insertion order).
    pub fn list_spans(&self, filters: &[Filter], cancel: &Cancel) -> Result<Vec<SpanRecord>> {
        filter::validate_filters::<SpanRecord>(filters)?;
        cancel.check()?;

        let snapshot = self.span_snapshot();
        let mut ticker = cancel.ticker(CANCEL_EVERY);
        let mut matched = Vec::new();
        for span in &snapshot {
            ticker.tick()?;
            if filter::matches_all(span.as_ref(), filters) {
                matched.push(Arc::clone(span));
            }
        }

        matched.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(matched.into_iter().map(|s| (*s).clone()).collect())
    }

    /// Flat log listing, most recent first (ties keep insertion order).
    pub fn list_logs(&self, filters: &[Filter], cancel: &Cancel) -> Result<Vec<LogRecord>> {
        filter::validate_filters::<LogRecord>(filters)?;
        cancel.check()?;

        let snapshot = self.log_snapshot();
        let mut ticker = cancel.ticker(CANCEL_EVERY);
        let mut matched = Vec::new();
        for log in &snapshot {
            ticker.tick()?;
            if filter::matches_all(log.as_ref(), filters) {
                matched.push(Arc::clone(log));
            }
        }

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matched.into_iter().map(|l| (*l).clone()).collect())
    }

    /// Distinct attribute keys seen across spans, sorted.
    pub fn span_attribute_keys(&self, cancel: &Cancel) -> Result<Vec<String>> {
        cancel.check()?;

        let snapshot = self.span_snapshot();
        let mut ticker = cancel.ticker(CANCEL_EVERY);
        let mut keys = BTreeSet::new();
        for span in &snapshot {
            ticker.tick()?;
            for attr in &span.attributes {
                if !keys.contains(&attr.key) {
                    keys.insert(attr.key.clone());
                }
            }
        }
        Ok(keys.into_iter().collect())
    }
}
