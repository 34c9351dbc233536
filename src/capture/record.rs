//! Exchange records.
//!
//! One [`Exchange`] per proxied request, serialized as:
//!
//! ```text
//! {
//!   "timestamp": "2024-01-01T00:00:00Z",
//!   "id": 1,
//!   "path": "/api/chat",
//!   "method": "POST",
//!   "request":  { "headers": {..}, "body": .. },
//!   "response": { "status": 200, "headers": {..}, "body": .. }
//! }
//! ```

use axum::http::{HeaderMap, Method, StatusCode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::capture::classify::{classify, ClassifiedBody};
use crate::capture::sequence::ExchangeId;

const ROOT_PLACEHOLDER: &str = "root";

/// Header name to every value received for it, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderMultiMap(BTreeMap<String, Vec<String>>);

impl HeaderMultiMap {
    /// Copy a header map. Names arrive lowercased from the HTTP parser and
    /// are recorded that way; values that are not UTF-8 are decoded lossily.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            map.entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturedRequest {
    pub headers: HeaderMultiMap,
    #[serde(skip_serializing_if = "ClassifiedBody::is_absent")]
    pub body: ClassifiedBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: HeaderMultiMap,
    #[serde(skip_serializing_if = "ClassifiedBody::is_absent")]
    pub body: ClassifiedBody,
}

/// A complete request/response cycle, ready to persist.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    #[serde(serialize_with = "rfc3339_seconds")]
    pub timestamp: DateTime<Utc>,
    pub id: ExchangeId,
    pub path: String,
    pub method: String,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
}

impl Exchange {
    /// `<id>-<sanitized path>.json`
    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.id, sanitize_path(&self.path))
    }
}

/// Everything known about an exchange once the upstream has answered with
/// a status line and headers. The response body is still in flight.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    pub id: ExchangeId,
    pub arrived_at: DateTime<Utc>,
    pub path: String,
    pub method: Method,
    pub request_headers: HeaderMap,
    pub request_body: Vec<u8>,
    pub status: StatusCode,
    pub response_headers: HeaderMap,
}

impl PendingExchange {
    /// Seal the exchange with the response body that reached the caller.
    pub fn complete(self, response_body: &[u8]) -> Exchange {
        Exchange {
            timestamp: self.arrived_at,
            id: self.id,
            path: self.path,
            method: self.method.to_string(),
            request: CapturedRequest {
                headers: HeaderMultiMap::from_headers(&self.request_headers),
                body: classify(&self.request_body),
            },
            response: CapturedResponse {
                status: self.status.as_u16(),
                headers: HeaderMultiMap::from_headers(&self.response_headers),
                body: classify(response_body),
            },
        }
    }
}

/// Turn a request path into a filename fragment.
pub fn sanitize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return ROOT_PLACEHOLDER.to_string();
    }
    trimmed.replace(['/', '\\'], "_")
}

fn rfc3339_seconds<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn pending(path: &str, request_body: &[u8]) -> PendingExchange {
        let mut request_headers = HeaderMap::new();
        request_headers.insert("content-type", HeaderValue::from_static("application/json"));
        request_headers.append("x-tag", HeaderValue::from_static("a"));
        request_headers.append("x-tag", HeaderValue::from_static("b"));

        let mut response_headers = HeaderMap::new();
        response_headers.insert("content-type", HeaderValue::from_static("application/x-ndjson"));

        PendingExchange {
            id: ExchangeId::new(7),
            arrived_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            path: path.to_string(),
            method: Method::POST,
            request_headers,
            request_body: request_body.to_vec(),
            status: StatusCode::OK,
            response_headers,
        }
    }

    #[test]
    fn sanitize_path_cases() {
        assert_eq!(sanitize_path("/api/tags"), "api_tags");
        assert_eq!(sanitize_path("/api/chat/"), "api_chat");
        assert_eq!(sanitize_path("/"), "root");
        assert_eq!(sanitize_path(""), "root");
        assert_eq!(sanitize_path("//"), "root");
        assert_eq!(sanitize_path("/a\\b/c"), "a_b_c");
    }

    #[test]
    fn file_name_uses_id_and_path() {
        let exchange = pending("/api/tags", b"").complete(b"");
        assert_eq!(exchange.file_name(), "7-api_tags.json");

        let root = pending("/", b"").complete(b"");
        assert_eq!(root.file_name(), "7-root.json");
    }

    #[test]
    fn header_multimap_keeps_every_value_in_order() {
        let exchange = pending("/api/chat", b"").complete(b"");
        assert_eq!(
            exchange.request.headers.get("x-tag"),
            Some(&["a".to_string(), "b".to_string()][..])
        );
        assert_eq!(exchange.request.headers.len(), 2);
    }

    #[test]
    fn header_names_are_recorded_lowercase() {
        let mut headers = HeaderMap::new();
        let name = axum::http::HeaderName::from_bytes(b"X-Request-Tag").unwrap();
        headers.append(name.clone(), HeaderValue::from_static("One"));
        headers.append(name, HeaderValue::from_static("Two"));

        let map = HeaderMultiMap::from_headers(&headers);
        assert_eq!(map.get("X-Request-Tag"), None);
        assert_eq!(
            map.get("x-request-tag"),
            Some(&["One".to_string(), "Two".to_string()][..])
        );
    }

    #[test]
    fn non_utf8_header_value_is_lossy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bin", HeaderValue::from_bytes(&[b'o', 0xfe, b'k']).unwrap());
        let map = HeaderMultiMap::from_headers(&headers);
        assert_eq!(map.get("x-bin"), Some(&["o\u{fffd}k".to_string()][..]));
    }

    #[test]
    fn serialized_shape() {
        let exchange = pending("/api/chat", br#"{"model":"llama3"}"#)
            .complete(b"{\"done\":false}\n{\"done\":true}\n");
        let value: Value = serde_json::to_value(&exchange).unwrap();

        assert_eq!(value["timestamp"], "2024-05-01T12:30:00Z");
        assert_eq!(value["id"], 7);
        assert_eq!(value["path"], "/api/chat");
        assert_eq!(value["method"], "POST");
        assert_eq!(value["request"]["headers"]["x-tag"], json!(["a", "b"]));
        assert_eq!(value["request"]["body"], json!({"model": "llama3"}));
        assert_eq!(value["response"]["status"], 200);
        assert_eq!(
            value["response"]["body"],
            json!([{"done": false}, {"done": true}])
        );
    }

    #[test]
    fn absent_bodies_are_omitted() {
        let exchange = pending("/api/tags", b"   ").complete(b"");
        let value: Value = serde_json::to_value(&exchange).unwrap();
        assert!(value["request"].get("body").is_none());
        assert!(value["response"].get("body").is_none());
        assert!(value["response"].get("headers").is_some());
    }

    #[test]
    fn field_order_matches_artifact_layout() {
        let exchange = pending("/api/tags", b"").complete(b"");
        let text = serde_json::to_string(&exchange).unwrap();
        let positions: Vec<usize> = ["\"timestamp\"", "\"id\"", "\"path\"", "\"method\"", "\"request\"", "\"response\""]
            .iter()
            .map(|key| text.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
