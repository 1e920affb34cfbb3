use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::span::SpanRecord;

/// Derived view over the spans sharing one `trace_id`. Never stored: a trace
/// exists exactly when at least one of its spans does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceView {
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ns: i64,
    pub span_count: usize,
}

impl TraceView {
    /// Returns None for an empty span set (a trace with zero spans does not
    /// exist).
    pub fn from_spans<'a, I>(trace_id: &str, spans: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a SpanRecord>,
    {
        let mut start: Option<DateTime<Utc>> = None;
        let mut end: Option<DateTime<Utc>> = None;
        let mut count = 0usize;

        for span in spans {
            count += 1;
            start = Some(start.map_or(span.start_time, |s| s.min(span.start_time)));
            end = Some(end.map_or(span.end_time, |e| e.max(span.end_time)));
        }

        let (start, end) = (start?, end?);
        Some(Self {
            trace_id: trace_id.to_string(),
            start_time: start,
            end_time: end,
            duration_ns: (end - start).num_nanoseconds().unwrap_or(i64::MAX),
            span_count: count,
        })
    }
}

/// One node of an assembled waterfall tree. Offsets are percentages of the
/// trace duration, clamped to [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanNode {
    pub span: SpanRecord,
    pub start_offset: f64,
    pub end_offset: f64,
    pub children: Vec<SpanNode>,
}

impl SpanNode {
    /// Nodes in this subtree, the node itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SpanNode::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceTree {
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_ns: i64,
    pub span_count: usize,
    /// Parent links severed because following them would revisit a span
    /// already on the current path. Data-integrity signal, not an error.
    pub truncated_cycles: usize,
    pub roots: Vec<SpanNode>,
}
