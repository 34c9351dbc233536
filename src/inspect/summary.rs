//! Assistant output and generation statistics from captured response bodies.
//!
//! Understands the two shapes the upstream produces: a single response
//! object, or the list of streamed chunks whose last element has
//! `"done": true` and carries the counters. Durations are nanoseconds.

use serde::Serialize;
use serde_json::Value;

/// Concatenated assistant output of a response body.
pub fn reconstruct_response(body: &Value) -> String {
    match body {
        Value::Array(chunks) => chunks
            .iter()
            .filter(|chunk| !is_done(chunk))
            .filter_map(chunk_text)
            .collect(),
        Value::Object(_) => chunk_text(body).unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

fn is_done(chunk: &Value) -> bool {
    chunk.get("done").and_then(Value::as_bool).unwrap_or(false)
}

/// `message.content` for chat, `response` for generate.
fn chunk_text(chunk: &Value) -> Option<&str> {
    chunk
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .or_else(|| chunk.get("response").and_then(Value::as_str))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationStats {
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub total_duration_secs: f64,
    pub eval_ms_per_token: f64,
    pub prompt_ms_per_token: f64,
}

impl GenerationStats {
    /// Stats from the final chunk of a stream or from a single response.
    pub fn from_body(body: &Value) -> Option<Self> {
        match body {
            Value::Array(chunks) => chunks.iter().find(|c| is_done(c)).map(Self::from_object),
            Value::Object(_) => Some(Self::from_object(body)),
            _ => None,
        }
    }

    fn from_object(obj: &Value) -> Self {
        let field = |name: &str| obj.get(name).and_then(Value::as_u64).unwrap_or(0);

        let tokens_in = field("prompt_eval_count");
        let tokens_out = field("eval_count");
        Self {
            tokens_in,
            tokens_out,
            total_duration_secs: field("total_duration") as f64 / 1e9,
            eval_ms_per_token: field("eval_duration") as f64 / tokens_out.max(1) as f64 / 1e6,
            prompt_ms_per_token: field("prompt_eval_duration") as f64 / tokens_in.max(1) as f64 / 1e6,
        }
    }
}
