//! Body classification.
//!
//! Inference servers answer either with one JSON document or with a stream of
//! newline-delimited JSON chunks. Request and response bodies are classified
//! into one of four shapes so the record keeps them as structured data
//! without the caller declaring which shape to expect.

use serde::{Serialize, Serializer};
use serde_json::Value;

/// A body interpreted for logging.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ClassifiedBody {
    /// Empty or whitespace-only input.
    #[default]
    Absent,
    /// Exactly one JSON value.
    Single(Value),
    /// Newline-delimited JSON values, in line order.
    Sequence(Vec<Value>),
    /// Anything else, kept as the trimmed text.
    Raw(String),
}

impl ClassifiedBody {
    pub fn is_absent(&self) -> bool {
        matches!(self, ClassifiedBody::Absent)
    }
}

impl Serialize for ClassifiedBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClassifiedBody::Absent => serializer.serialize_none(),
            ClassifiedBody::Single(value) => value.serialize(serializer),
            ClassifiedBody::Sequence(values) => values.serialize(serializer),
            ClassifiedBody::Raw(text) => serializer.serialize_str(text),
        }
    }
}

/// Classify a raw body. Never fails.
///
/// Order matters: a buffer that parses as a single value wins over the
/// line-by-line attempt, and a single unparsable line turns the whole body
/// into [`ClassifiedBody::Raw`].
pub fn classify(bytes: &[u8]) -> ClassifiedBody {
    let trimmed = bytes.trim_ascii();
    if trimmed.is_empty() {
        return ClassifiedBody::Absent;
    }

    if let Ok(value) = serde_json::from_slice::<Value>(trimmed) {
        return ClassifiedBody::Single(value);
    }

    match parse_lines(trimmed) {
        Some(values) => ClassifiedBody::Sequence(values),
        None => ClassifiedBody::Raw(String::from_utf8_lossy(trimmed).into_owned()),
    }
}

/// Parse every non-blank line as JSON; `None` as soon as one line fails.
fn parse_lines(bytes: &[u8]) -> Option<Vec<Value>> {
    bytes
        .split(|b| *b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice::<Value>(line).ok())
        .collect()
}
