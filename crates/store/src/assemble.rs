use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracelens_core::model::span::SpanRecord;
use tracelens_core::model::trace::{SpanNode, TraceTree, TraceView};

use crate::Store;

impl Store {
    /// Assembled waterfall tree for one trace, None when the trace has no
    /// spans.
    pub fn trace_tree(&self, trace_id: &str) -> Option<TraceTree> {
        build_tree(trace_id, self.get_spans_by_trace(trace_id))
    }
}

/// Reconstructs the span tree from parent pointers. A span is a root when
/// its parent is null or absent from this trace's span set (orphans are
/// roots, not errors). Parent links that would revisit a span already on the
/// current path are severed and counted; spans unreachable from any root
/// (pure cycles) are traversed from their earliest member so every input
/// span appears in the tree exactly once.
pub fn build_tree(trace_id: &str, mut spans: Vec<SpanRecord>) -> Option<TraceTree> {
    if spans.is_empty() {
        return None;
    }

    let view = TraceView::from_spans(trace_id, spans.iter())?;

    // Child and root order: start_time ascending, span_id as tie-break.
    spans.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.span_id.cmp(&b.span_id))
    });

    let ids: HashSet<&str> = spans.iter().map(|s| s.span_id.as_str()).collect();
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for (idx, span) in spans.iter().enumerate() {
        match span.parent_span_id.as_deref().filter(|p| ids.contains(p)) {
            Some(parent) => children.entry(parent).or_default().push(idx),
            None => roots.push(idx),
        }
    }

    let mut builder = Builder {
        spans: &spans,
        children: &children,
        on_path: vec![false; spans.len()],
        visited: vec![false; spans.len()],
        truncated: 0,
        trace_start: view.start_time,
        trace_duration_ns: view.duration_ns,
    };

    let mut nodes = Vec::with_capacity(roots.len());
    for root in roots {
        nodes.push(builder.build(root));
    }

    // Anything left is a parent cycle with no entry from a root; walk it
    // from its earliest member so the tree still covers every span.
    for idx in 0..spans.len() {
        if !builder.visited[idx] {
            nodes.push(builder.build(idx));
        }
    }

    let truncated = builder.truncated;
    Some(TraceTree {
        trace_id: trace_id.to_string(),
        start_time: view.start_time,
        duration_ns: view.duration_ns,
        span_count: spans.len(),
        truncated_cycles: truncated,
        roots: nodes,
    })
}

struct Builder<'a> {
    spans: &'a [SpanRecord],
    children: &'a HashMap<&'a str, Vec<usize>>,
    on_path: Vec<bool>,
    visited: Vec<bool>,
    truncated: usize,
    trace_start: DateTime<Utc>,
    trace_duration_ns: i64,
}

impl Builder<'_> {
    fn build(&mut self, idx: usize) -> SpanNode {
        self.visited[idx] = true;
        self.on_path[idx] = true;

        let span = &self.spans[idx];
        let child_indices = self
            .children
            .get(span.span_id.as_str())
            .cloned()
            .unwrap_or_default();

        let mut children = Vec::with_capacity(child_indices.len());
        for child in child_indices {
            if self.on_path[child] {
                self.truncated += 1;
                tracing::warn!(
                    trace_id = %span.trace_id,
                    span_id = %self.spans[child].span_id,
                    "parent cycle truncated during trace assembly"
                );
                continue;
            }
            if self.visited[child] {
                continue;
            }
            children.push(self.build(child));
        }

        self.on_path[idx] = false;
        SpanNode {
            start_offset: self.offset(span.start_time),
            end_offset: self.offset(span.end_time),
            span: span.clone(),
            children,
        }
    }

    fn offset(&self, ts: DateTime<Utc>) -> f64 {
        if self.trace_duration_ns == 0 {
            return 0.0;
        }
        let elapsed = (ts - self.trace_start).num_nanoseconds().unwrap_or(0) as f64;
        (elapsed / self.trace_duration_ns as f64 * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use testkit::span_at;

    use super::*;

    #[test]
    fn builds_the_expected_waterfall() {
        // span2 is the root; span1 and span3 are its children, starting
        // 10ms and 20ms in.
        let spans = vec![
            span_at("T1", "span2", None, 0, 30),
            span_at("T1", "span1", Some("span2"), 10, 15),
            span_at("T1", "span3", Some("span2"), 20, 28),
        ];

        let tree = build_tree("T1", spans).unwrap();
        assert_eq!(tree.span_count, 3);
        assert_eq!(tree.duration_ns, 30 * 1_000_000);
        assert_eq!(tree.truncated_cycles, 0);
        assert_eq!(tree.roots.len(), 1);

        let root = &tree.roots[0];
        assert_eq!(root.span.span_id, "span2");
        let child_ids: Vec<&str> = root.children.iter().map(|c| c.span.span_id.as_str()).collect();
        assert_eq!(child_ids, vec!["span1", "span3"]);
        assert_eq!(tree.roots.iter().map(SpanNode::node_count).sum::<usize>(), 3);
    }

    #[test]
    fn children_sort_by_start_then_id() {
        let spans = vec![
            span_at("t", "r", None, 0, 100),
            span_at("t", "b", Some("r"), 10, 20),
            span_at("t", "a", Some("r"), 10, 20),
            span_at("t", "c", Some("r"), 5, 9),
        ];
        let tree = build_tree("t", spans).unwrap();
        let order: Vec<&str> = tree.roots[0]
            .children
            .iter()
            .map(|c| c.span.span_id.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn orphan_parent_makes_a_root() {
        let spans = vec![
            span_at("t", "real-root", None, 0, 50),
            span_at("t", "orphan", Some("severed-by-sampling"), 5, 10),
        ];
        let tree = build_tree("t", spans).unwrap();
        assert_eq!(tree.roots.len(), 2);
        assert_eq!(tree.truncated_cycles, 0);
        let ids: Vec<&str> = tree.roots.iter().map(|r| r.span.span_id.as_str()).collect();
        assert_eq!(ids, vec!["real-root", "orphan"]);
    }

    #[test]
    fn two_span_cycle_truncates_and_still_covers_everything() {
        let a = span_at("t", "a", Some("b"), 0, 10);
        let b = span_at("t", "b", Some("a"), 2, 8);

        let tree = build_tree("t", vec![a, b]).unwrap();
        assert_eq!(tree.span_count, 2);
        assert_eq!(tree.truncated_cycles, 1);
        // Entry is the earliest member; the cycle is cut at the return edge.
        assert_eq!(tree.roots.len(), 1);
        assert_eq!(tree.roots[0].span.span_id, "a");
        assert_eq!(tree.roots[0].children.len(), 1);
        assert_eq!(tree.roots[0].children[0].span.span_id, "b");
        assert_eq!(tree.roots.iter().map(SpanNode::node_count).sum::<usize>(), 2);
    }

    #[test]
    fn self_parent_truncates() {
        let span = span_at("t", "loop", Some("loop"), 0, 10);
        let tree = build_tree("t", vec![span]).unwrap();
        assert_eq!(tree.span_count, 1);
        assert_eq!(tree.truncated_cycles, 1);
        assert_eq!(tree.roots.len(), 1);
        assert!(tree.roots[0].children.is_empty());
    }

    #[test]
    fn offsets_are_percentages_of_trace_duration() {
        let spans = vec![
            span_at("t", "root", None, 0, 100),
            span_at("t", "mid", Some("root"), 25, 75),
        ];
        let tree = build_tree("t", spans).unwrap();
        let root = &tree.roots[0];
        assert_eq!(root.start_offset, 0.0);
        assert_eq!(root.end_offset, 100.0);
        let mid = &root.children[0];
        assert_eq!(mid.start_offset, 25.0);
        assert_eq!(mid.end_offset, 75.0);
    }

    #[test]
    fn zero_duration_trace_has_zero_offsets() {
        let spans = vec![span_at("t", "instant", None, 5, 5)];
        let tree = build_tree("t", spans).unwrap();
        assert_eq!(tree.duration_ns, 0);
        assert_eq!(tree.roots[0].start_offset, 0.0);
        assert_eq!(tree.roots[0].end_offset, 0.0);
    }

    #[test]
    fn empty_input_is_none() {
        assert!(build_tree("t", Vec::new()).is_none());
    }
}
