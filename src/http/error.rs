//! Errors surfaced to the proxied caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure on the forwarding path. None of these produce a capture record.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The inbound body could not be read (client went away, limit hit).
    #[error("failed to read request body: {0}")]
    ClientBody(#[source] axum::Error),

    /// Target and inbound request URI did not combine into a valid URI.
    #[error("invalid upstream URI `{uri}`: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    /// Connection refused, reset, DNS failure, timeout...
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::ClientBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidUri { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let message = match &self {
            ProxyError::Upstream(e) => format!("Proxy error: {}", error_chain(e)),
            other => other.to_string(),
        };
        (self.status(), message).into_response()
    }
}

/// Render an error and all of its sources as `outer: inner: root`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}
