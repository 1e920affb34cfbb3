pub mod log;
pub mod span;
pub mod trace;

use serde::{Deserialize, Serialize};

/// One key/value pair owned by a span or log record. Keys may repeat
/// (repeated tags); attributes live and die with their record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
