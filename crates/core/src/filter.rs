//! Filter construction and evaluation live in this one module so the two
//! sites can never drift apart: the operator enum below is the complete
//! operator set, and `matches_filter` is its only interpretation.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::Attribute;
use crate::model::log::LogRecord;
use crate::model::span::SpanRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[default]
    Equals,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
}

/// One predicate. Predicates in a list are ANDed. A `column` that names a
/// known record column is a column predicate; any other name is an
/// attribute-key predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub column: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub op: FilterOp,
}

impl Filter {
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            op: FilterOp::Equals,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Numeric,
}

pub enum FieldValue<'a> {
    Text(Cow<'a, str>),
    Number(f64),
}

impl<'a> FieldValue<'a> {
    fn text(value: &'a str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

/// A record the evaluator can look into: a fixed column set plus an open
/// attribute set.
pub trait Queryable {
    /// Kind of `name` as a column, None when `name` is not a column of this
    /// record type (and is therefore resolved as an attribute key).
    fn column_kind(name: &str) -> Option<ColumnKind>
    where
        Self: Sized;

    /// Current value of a column; None when the column is null on this
    /// record.
    fn column_value(&self, name: &str) -> Option<FieldValue<'_>>;

    fn attributes(&self) -> &[Attribute];
}

impl Queryable for SpanRecord {
    fn column_kind(name: &str) -> Option<ColumnKind> {
        match name {
            "span_id" | "trace_id" | "parent_span_id" | "operation_name" | "service_name"
            | "start_time" | "end_time" | "status_message" | "span_kind"
            | "instrumentation_library" => Some(ColumnKind::Text),
            "duration_ns" | "status_code" => Some(ColumnKind::Numeric),
            _ => None,
        }
    }

    fn column_value(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "span_id" => Some(FieldValue::text(&self.span_id)),
            "trace_id" => Some(FieldValue::text(&self.trace_id)),
            "parent_span_id" => self.parent_span_id.as_deref().map(FieldValue::text),
            "operation_name" => Some(FieldValue::text(&self.operation_name)),
            "service_name" => self.service_name.as_deref().map(FieldValue::text),
            "start_time" => Some(FieldValue::Text(Cow::Owned(self.start_time.to_rfc3339()))),
            "end_time" => Some(FieldValue::Text(Cow::Owned(self.end_time.to_rfc3339()))),
            "status_message" => self.status_message.as_deref().map(FieldValue::text),
            "span_kind" => Some(FieldValue::text(self.span_kind.as_str())),
            "instrumentation_library" => {
                self.instrumentation_library.as_deref().map(FieldValue::text)
            }
            "duration_ns" => Some(FieldValue::Number(self.duration_ns as f64)),
            "status_code" => Some(FieldValue::Number(f64::from(self.status_code))),
            _ => None,
        }
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

impl Queryable for LogRecord {
    fn column_kind(name: &str) -> Option<ColumnKind> {
        match name {
            "log_id" | "trace_id" | "span_id" | "timestamp" | "observed_timestamp"
            | "severity_text" | "body" | "service_name" | "instrumentation_library" => {
                Some(ColumnKind::Text)
            }
            "severity_number" => Some(ColumnKind::Numeric),
            _ => None,
        }
    }

    fn column_value(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "log_id" => Some(FieldValue::Text(Cow::Owned(self.log_id.to_string()))),
            "trace_id" => self.trace_id.as_deref().map(FieldValue::text),
            "span_id" => self.span_id.as_deref().map(FieldValue::text),
            "timestamp" => Some(FieldValue::Text(Cow::Owned(self.timestamp.to_rfc3339()))),
            "observed_timestamp" => self
                .observed_timestamp
                .map(|ts| FieldValue::Text(Cow::Owned(ts.to_rfc3339()))),
            "severity_text" => self.severity_text.as_deref().map(FieldValue::text),
            "body" => self.body.as_deref().map(FieldValue::text),
            "service_name" => self.service_name.as_deref().map(FieldValue::text),
            "instrumentation_library" => {
                self.instrumentation_library.as_deref().map(FieldValue::text)
            }
            "severity_number" => Some(FieldValue::Number(f64::from(self.severity_number))),
            _ => None,
        }
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

/// Rejects filters that cannot be evaluated meaningfully: numeric range
/// operators on string columns or attributes, and non-numeric comparison
/// values against numeric columns. Runs before any scan so a bad request
/// never half-executes.
pub fn validate_filters<R: Queryable>(filters: &[Filter]) -> Result<()> {
    for filter in filters {
        match filter.op {
            FilterOp::GreaterThan | FilterOp::LessThan => match R::column_kind(&filter.column) {
                Some(ColumnKind::Numeric) => {
                    parse_comparison_value(filter)?;
                }
                Some(ColumnKind::Text) => {
                    return Err(EngineError::Validation(format!(
                        "numeric range filter not supported on string column {:?}",
                        filter.column
                    )));
                }
                None => {
                    return Err(EngineError::Validation(format!(
                        "numeric range filter not supported on attribute {:?}",
                        filter.column
                    )));
                }
            },
            FilterOp::Equals => {
                if R::column_kind(&filter.column) == Some(ColumnKind::Numeric) {
                    parse_comparison_value(filter)?;
                }
            }
            FilterOp::Exists | FilterOp::NotExists => {}
        }
    }
    Ok(())
}

fn parse_comparison_value(filter: &Filter) -> Result<f64> {
    filter.value.parse::<f64>().map_err(|_| {
        EngineError::Validation(format!(
            "filter on numeric column {:?} requires a numeric value, got {:?}",
            filter.column, filter.value
        ))
    })
}

pub fn matches_all<R: Queryable>(record: &R, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches_filter(record, f))
}

pub fn matches_filter<R: Queryable>(record: &R, filter: &Filter) -> bool {
    let is_column = R::column_kind(&filter.column).is_some();
    match filter.op {
        FilterOp::Equals => {
            if is_column {
                match record.column_value(&filter.column) {
                    Some(FieldValue::Number(n)) => {
                        filter.value.parse::<f64>().is_ok_and(|v| v == n)
                    }
                    Some(FieldValue::Text(t)) => t.as_ref() == filter.value.as_str(),
                    // Absent column fails the filter; there is no implicit
                    // exists semantics outside the explicit operators.
                    None => false,
                }
            } else {
                // A record may carry several values for one key; any match
                // succeeds.
                record
                    .attributes()
                    .iter()
                    .any(|a| a.key == filter.column && a.value == filter.value)
            }
        }
        FilterOp::GreaterThan => compare_numeric(record, filter, |field, value| field > value),
        FilterOp::LessThan => compare_numeric(record, filter, |field, value| field < value),
        FilterOp::Exists => is_present(record, &filter.column),
        FilterOp::NotExists => !is_present(record, &filter.column),
    }
}

fn compare_numeric<R: Queryable>(
    record: &R,
    filter: &Filter,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    let Some(FieldValue::Number(field)) = record.column_value(&filter.column) else {
        return false;
    };
    filter.value.parse::<f64>().is_ok_and(|v| cmp(field, v))
}

fn is_present<R: Queryable>(record: &R, name: &str) -> bool {
    if R::column_kind(name).is_some() {
        record.column_value(name).is_some()
    } else {
        record.attributes().iter().any(|a| a.key == name)
    }
}

/// Value of `name` rendered as grouping text. Columns take precedence over
/// attributes; the first occurrence of a repeated attribute key groups.
pub fn group_value<R: Queryable>(record: &R, name: &str) -> Option<String> {
    if R::column_kind(name).is_some() {
        record.column_value(name).map(|v| match v {
            FieldValue::Text(t) => t.into_owned(),
            FieldValue::Number(n) => format_group_number(n),
        })
    } else {
        record
            .attributes()
            .iter()
            .find(|a| a.key == name)
            .map(|a| a.value.clone())
    }
}

fn format_group_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// Numeric reading of a column for Sum/Avg/Min/Max. None when the value is
/// missing or non-numeric; the caller skips the record rather than failing
/// the query.
pub fn numeric_column<R: Queryable>(record: &R, name: &str) -> Option<f64> {
    match record.column_value(name)? {
        FieldValue::Number(n) => Some(n),
        FieldValue::Text(t) => t.parse().ok(),
    }
}

/// First value of `key` that parses as a number.
pub fn numeric_attribute<R: Queryable>(record: &R, key: &str) -> Option<f64> {
    record
        .attributes()
        .iter()
        .filter(|a| a.key == key)
        .find_map(|a| a.value.parse().ok())
}
