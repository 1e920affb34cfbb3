use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::query::StatusResponse;

/// In-memory record store: append arenas of immutable records plus index
/// maps, all guarded by one reader-writer lock. Writers hold the lock only
/// long enough to publish a record atomically; readers take an `Arc`
/// snapshot under the read lock and evaluate outside it, so a slow scan
/// never blocks ingestion.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    pub(crate) spans: Vec<Arc<SpanRecord>>,
    /// span_id -> slot in `spans`.
    pub(crate) span_ids: HashMap<String, usize>,
    /// trace_id -> slots in `spans`, in insertion order.
    pub(crate) traces: HashMap<String, Vec<usize>>,
    pub(crate) logs: Vec<Arc<LogRecord>>,
}

impl StoreInner {
    pub(crate) fn rebuild_indexes(&mut self) {
        let Self {
            spans,
            span_ids,
            traces,
            ..
        } = self;
        span_ids.clear();
        traces.clear();
        for (slot, span) in spans.iter().enumerate() {
            span_ids.insert(span.span_id.clone(), slot);
            traces.entry(span.trace_id.clone()).or_default().push(slot);
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write()
    }

    /// Cheap snapshot (Arc clones) of all spans at this instant.
    pub(crate) fn span_snapshot(&self) -> Vec<Arc<SpanRecord>> {
        self.read().spans.clone()
    }

    pub(crate) fn log_snapshot(&self) -> Vec<Arc<LogRecord>> {
        self.read().logs.clone()
    }

    pub fn status(&self) -> StatusResponse {
        let inner = self.read();
        StatusResponse {
            spans_count: inner.spans.len(),
            logs_count: inner.logs.len(),
            traces_count: inner.traces.len(),
            oldest_span_start: inner.spans.iter().map(|s| s.start_time).min(),
            newest_span_start: inner.spans.iter().map(|s| s.start_time).max(),
        }
    }
}
