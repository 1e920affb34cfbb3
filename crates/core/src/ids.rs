use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Identifiers are opaque strings chosen by the producer. The store only
/// requires that they are non-empty and printable; it never derives meaning
/// from their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(String);

fn check(kind: &str, input: &str) -> Result<()> {
    if input.is_empty() {
        return Err(EngineError::Validation(format!("{kind} must not be empty")));
    }
    if input.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EngineError::Validation(format!(
            "{kind} must not contain whitespace or control characters: {input:?}"
        )));
    }
    Ok(())
}

impl TraceId {
    pub fn parse(input: &str) -> Result<Self> {
        check("trace id", input)?;
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SpanId {
    pub fn parse(input: &str) -> Result<Self> {
        check("span id", input)?;
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_opaque_ids() {
        let trace = TraceId::parse("4bf92f3577b34da6a3ce929d0e0e4736").unwrap();
        let span = SpanId::parse("T1-root").unwrap();
        assert_eq!(trace.as_str(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(span.as_str(), "T1-root");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(TraceId::parse("").is_err());
        assert!(SpanId::parse("a b").is_err());
        assert!(SpanId::parse("a\nb").is_err());
    }
}
