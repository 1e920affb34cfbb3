use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::filter::{ColumnKind, Filter, Queryable, validate_filters};
use crate::model::Attribute;
use crate::model::span::SpanRecord;
use crate::time::BinUnit;

/// The aggregate computation. Serde's externally-tagged encoding matches the
/// wire exactly (`"Count"` or `{"Sum": "duration_ns"}`), and the enum shape
/// makes a column mandatory for everything but Count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AggregateType {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
}

impl AggregateType {
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Count => None,
            Self::Sum(c) | Self::Avg(c) | Self::Min(c) | Self::Max(c) => Some(c),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum(_) => "sum",
            Self::Avg(_) => "avg",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
        }
    }
}

/// Whether the aggregate column (and nothing else) names a span column or a
/// span attribute key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AggregateSource {
    SpanColumn,
    SpanAttribute,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    pub agg_type: AggregateType,
    pub source: AggregateSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBin {
    pub bin: BinUnit,
    pub value: u32,
}

impl TimeBin {
    /// Bucket width in nanoseconds; a zero multiple is caller error.
    pub fn width_ns(&self) -> Result<i64> {
        if self.value == 0 {
            return Err(EngineError::Validation(
                "time_bin value must be positive".to_string(),
            ));
        }
        self.bin
            .unit_ns()
            .checked_mul(i64::from(self.value))
            .ok_or_else(|| EngineError::Validation("time_bin width overflows".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySpec {
    pub aggregate: Aggregate,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub time_bin: Option<TimeBin>,
}

impl QuerySpec {
    /// Full pre-execution validation; a spec that passes here can only fail
    /// later by cancellation. Returns the bucket width in nanoseconds.
    pub fn validate(&self) -> Result<i64> {
        let bin = self.time_bin.as_ref().ok_or_else(|| {
            EngineError::Validation("time_bin is required for time-series queries".to_string())
        })?;
        let width_ns = bin.width_ns()?;

        if let Some(column) = self.aggregate.agg_type.column()
            && self.aggregate.source == AggregateSource::SpanColumn
        {
            match SpanRecord::column_kind(column) {
                Some(ColumnKind::Numeric) => {}
                Some(ColumnKind::Text) => {
                    return Err(EngineError::Validation(format!(
                        "{} aggregate requires a numeric column, {column:?} is text",
                        self.aggregate.agg_type.name()
                    )));
                }
                None => {
                    return Err(EngineError::Validation(format!(
                        "unknown span column {column:?} for {} aggregate",
                        self.aggregate.agg_type.name()
                    )));
                }
            }
        }

        if let Some(group) = &self.group
            && group.is_empty()
        {
            return Err(EngineError::Validation(
                "group column must not be empty".to_string(),
            ));
        }

        validate_filters::<SpanRecord>(&self.filters)?;
        Ok(width_ns)
    }
}

/// One point of a time-series result: the bucket's end boundary and the
/// aggregate over records that fell into it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSeriesValue {
    pub end_time: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Parameters of `GET /traces`: span-level predicates, a trace matches when
/// at least one of its spans satisfies all of them.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TraceSearchRequest {
    pub service_name: Option<String>,
    pub operation_name: Option<String>,
    pub min_duration_ns: Option<i64>,
    pub max_duration_ns: Option<i64>,
    pub status_code: Option<i32>,
    #[serde(default)]
    pub span_attributes: Vec<Attribute>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl TraceSearchRequest {
    pub fn matches_span(&self, span: &SpanRecord) -> bool {
        if let Some(service) = &self.service_name
            && span.service_name.as_deref() != Some(service.as_str())
        {
            return false;
        }
        if let Some(operation) = &self.operation_name
            && span.operation_name != *operation
        {
            return false;
        }
        if let Some(status) = self.status_code
            && span.status_code != status
        {
            return false;
        }
        if let Some(min) = self.min_duration_ns
            && span.duration_ns < min
        {
            return false;
        }
        if let Some(max) = self.max_duration_ns
            && span.duration_ns > max
        {
            return false;
        }
        self.span_attributes
            .iter()
            .all(|wanted| span.attr_values(&wanted.key).any(|v| v == wanted.value))
    }
}

/// Outcome of a batch ingest: offending records are rejected individually,
/// the rest of the batch lands.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedRecord {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub spans_count: usize,
    pub logs_count: usize,
    pub traces_count: usize,
    pub oldest_span_start: Option<DateTime<Utc>>,
    pub newest_span_start: Option<DateTime<Utc>>,
}
