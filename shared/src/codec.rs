//! Tolerant decoding of sensor response bodies
//!
//! The distance endpoint has shipped several body formats over time:
//! ```text
//! {"cm": 12.5}     structured payload
//! 12.5  /  12,5    bare literal, either decimal separator
//! null             no reading
//! ```
//! Decoding runs in two stages: the structured form first, then the bare
//! literal. Anything that fits neither is `Malformed`, which callers treat as
//! an absent sample.

use serde_json::Value;
use thiserror::Error;

use crate::Sample;

/// Field holding the reading in the structured payload
pub const DISTANCE_FIELD: &str = "cm";

/// Errors from the literal stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Empty body")]
    Empty,

    #[error("Not a number: {0:?}")]
    NotANumber(String),

    #[error("Structured payload without numeric `{0}` field")]
    MissingField(&'static str),
}

/// Outcome of decoding one body
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Value(f64),
    Absent,
    Malformed(CodecError),
}

impl Reading {
    /// Collapse to a sample; malformed bodies become absent
    pub fn into_sample(self) -> Sample {
        match self {
            Reading::Value(v) => Sample::value(v),
            Reading::Absent | Reading::Malformed(_) => Sample::ABSENT,
        }
    }
}

/// Decode a response body using the default `cm` field
pub fn decode_reading(body: &[u8]) -> Reading {
    decode_reading_field(body, DISTANCE_FIELD)
}

/// Decode a response body, looking for `field` in structured payloads
pub fn decode_reading_field(body: &[u8], field: &'static str) -> Reading {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => match map.get(field) {
            Some(Value::Null) => Reading::Absent,
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Reading::Value)
                .unwrap_or(Reading::Malformed(CodecError::MissingField(field))),
            Some(Value::String(s)) => literal_reading(s),
            _ => Reading::Malformed(CodecError::MissingField(field)),
        },
        Ok(Value::Null) => Reading::Absent,
        Ok(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => Reading::Value(v),
            _ => Reading::Malformed(CodecError::NotANumber(n.to_string())),
        },
        Ok(Value::String(s)) => literal_reading(&s),
        Ok(other) => Reading::Malformed(CodecError::NotANumber(other.to_string())),
        Err(_) => literal_reading(&String::from_utf8_lossy(body)),
    }
}

fn literal_reading(text: &str) -> Reading {
    match parse_literal(text) {
        Ok(Some(v)) => Reading::Value(v),
        Ok(None) => Reading::Absent,
        Err(e) => Reading::Malformed(e),
    }
}

/// Parse a bare numeric literal with `.` or `,` as decimal separator
///
/// Returns `Ok(None)` for the literal `null`.
pub fn parse_literal(text: &str) -> Result<Option<f64>, CodecError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }
    if trimmed.eq_ignore_ascii_case("null") {
        return Ok(None);
    }

    let normalized = trimmed.replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(CodecError::NotANumber(trimmed.to_string())),
    }
}
