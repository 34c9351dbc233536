//! Reading capture files back from the log directory.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no exchange with id {0}")]
    NotFound(u64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedRequest {
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// A capture file as found on disk. Bodies stay untyped: a stored JSON
/// array may have been a single array or a chunk stream.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggedExchange {
    #[serde(skip)]
    pub file_name: String,
    pub timestamp: String,
    pub id: u64,
    pub path: String,
    pub method: String,
    pub request: LoggedRequest,
    pub response: LoggedResponse,
}

/// One chat message from a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl LoggedExchange {
    /// `model` field of the request body, if any.
    pub fn model(&self) -> Option<&str> {
        self.request.body.as_ref()?.get("model")?.as_str()
    }

    /// Chat messages of the request body, in order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let Some(messages) = self
            .request
            .body
            .as_ref()
            .and_then(|b| b.get("messages"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        messages
            .iter()
            .map(|m| ChatMessage {
                role: m
                    .get("role")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                content: m
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }

    /// Case-insensitive match over filename, model and message contents.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        if self.file_name.to_lowercase().contains(&query) {
            return true;
        }
        if self.model().is_some_and(|m| m.to_lowercase().contains(&query)) {
            return true;
        }
        self.messages()
            .iter()
            .any(|m| m.content.to_lowercase().contains(&query))
    }
}

/// Numeric id prefix of `<id>-<path>.json`.
pub fn file_id(file_name: &str) -> Option<u64> {
    let (prefix, _) = file_name.split_once('-')?;
    prefix.parse().ok()
}

/// Load every capture in `dir`, ordered by id. Unreadable or malformed
/// files are skipped with a warning.
pub fn load_exchanges(dir: &Path) -> Result<Vec<LoggedExchange>, InspectError> {
    let entries = std::fs::read_dir(dir).map_err(|source| InspectError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut exchanges = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "failed to read capture, skipping");
                continue;
            }
        };
        match serde_json::from_str::<LoggedExchange>(&content) {
            Ok(mut exchange) => {
                exchange.file_name = file_name;
                exchanges.push(exchange);
            }
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "failed to parse capture, skipping");
            }
        }
    }

    exchanges.sort_by(|a, b| {
        let key = |x: &LoggedExchange| (file_id(&x.file_name).unwrap_or(u64::MAX), x.file_name.clone());
        key(a).cmp(&key(b))
    });
    Ok(exchanges)
}

/// Load the capture with the given id.
pub fn find_exchange(dir: &Path, id: u64) -> Result<LoggedExchange, InspectError> {
    load_exchanges(dir)?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or(InspectError::NotFound(id))
}
