use std::collections::BTreeMap;
use std::sync::Arc;

use tracelens_core::cancel::Cancel;
use tracelens_core::error::Result;
use tracelens_core::filter;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::query::{AggregateSource, AggregateType, QuerySpec, TimeSeriesValue};
use tracelens_core::time::{bucket_end, bucket_index};

use crate::Store;
use crate::query::CANCEL_EVERY;

/// Group label when the grouping column/attribute is missing on a record.
/// Those records are never silently dropped.
const UNKNOWN_GROUP: &str = "unknown";

#[derive(Default)]
struct Cell {
    candidates: u64,
    contributions: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Cell {
    fn observe(&mut self, value: Option<f64>) {
        self.candidates += 1;
        let Some(v) = value else { return };
        if self.contributions == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.contributions += 1;
        self.sum += v;
    }

    /// None when the aggregate has nothing to report for this cell (all
    /// values missing or non-numeric); the bucket is then omitted.
    fn finish(&self, agg: &AggregateType) -> Option<f64> {
        match agg {
            AggregateType::Count => Some(self.candidates as f64),
            AggregateType::Sum(_) => (self.contributions > 0).then_some(self.sum),
            AggregateType::Avg(_) => {
                (self.contributions > 0).then(|| self.sum / self.contributions as f64)
            }
            AggregateType::Min(_) => (self.contributions > 0).then_some(self.min),
            AggregateType::Max(_) => (self.contributions > 0).then_some(self.max),
        }
    }
}

impl Store {
    /// Time-bucketed aggregation over spans. Buckets are anchored at the
    /// earliest matched record (boundaries are relative to the data, not
    /// wall-clock aligned), sparse, and ordered by end time then group.
    pub fn time_series(&self, spec: &QuerySpec, cancel: &Cancel) -> Result<Vec<TimeSeriesValue>> {
        let width_ns = spec.validate()?;
        cancel.check()?;

        let snapshot = self.span_snapshot();
        let mut ticker = cancel.ticker(CANCEL_EVERY);
        let mut matched: Vec<Arc<SpanRecord>> = Vec::new();
        for span in snapshot {
            ticker.tick()?;
            if filter::matches_all(span.as_ref(), &spec.filters) {
                matched.push(span);
            }
        }

        let Some(anchor) = matched.iter().map(|s| s.start_time).min() else {
            return Ok(Vec::new());
        };

        let mut cells: BTreeMap<(i64, Option<String>), Cell> = BTreeMap::new();
        for span in &matched {
            ticker.tick()?;
            let bucket = bucket_index(span.start_time, anchor, width_ns);
            let group = spec.group.as_deref().map(|g| {
                filter::group_value(span.as_ref(), g)
                    .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
            });
            let value = aggregate_value(span.as_ref(), &spec.aggregate.agg_type, spec.aggregate.source);
            cells.entry((bucket, group)).or_default().observe(value);
        }

        // BTreeMap iteration gives (bucket asc, group lexical) for free.
        let mut out = Vec::with_capacity(cells.len());
        for ((bucket, group), cell) in &cells {
            if let Some(value) = cell.finish(&spec.aggregate.agg_type) {
                out.push(TimeSeriesValue {
                    end_time: bucket_end(anchor, width_ns, *bucket),
                    value,
                    group: group.clone(),
                });
            }
        }
        Ok(out)
    }
}

fn aggregate_value(span: &SpanRecord, agg: &AggregateType, source: AggregateSource) -> Option<f64> {
    let column = agg.column()?;
    match source {
        AggregateSource::SpanColumn => filter::numeric_column(span, column),
        AggregateSource::SpanAttribute => filter::numeric_attribute(span, column),
    }
}
