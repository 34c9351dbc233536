//! Response streaming with capture.
//!
//! The upstream body is passed to the caller chunk by chunk while a copy is
//! kept. The exchange is handed to the sink only once the caller has been
//! given the whole body:
//! - the upstream stream ended, or
//! - the declared `Content-Length` was fully delivered (the server may drop
//!   the body at that point without polling it to the end), or
//! - the response carries no body at all (`HEAD`, 1xx, 204, 304, or a zero
//!   `Content-Length`), in which case the body may never be polled.
//!
//! An upstream body error or an early disconnect drops the exchange.

use axum::body::{Body, BodyDataStream, Bytes};
use axum::http::{header, HeaderMap, Method, StatusCode};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::capture::{PendingExchange, RecordSink};

struct CaptureTee {
    upstream: BodyDataStream,
    captured: Vec<u8>,
    expected_len: Option<usize>,
    delivered: bool,
    pending: Option<PendingExchange>,
    sink: Arc<dyn RecordSink>,
}

impl CaptureTee {
    fn push(&mut self, chunk: &Bytes) {
        self.captured.extend_from_slice(chunk);
        if self.expected_len == Some(self.captured.len()) {
            self.delivered = true;
        }
    }

    fn abandon(&mut self) {
        self.pending = None;
    }

    fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            let exchange = pending.complete(&self.captured);
            self.sink.record(exchange);
        }
    }
}

impl Drop for CaptureTee {
    fn drop(&mut self) {
        if self.delivered {
            self.finish();
        } else if let Some(pending) = &self.pending {
            tracing::debug!(
                id = %pending.id,
                received = self.captured.len(),
                "Response body not fully delivered, exchange not captured"
            );
        }
    }
}

/// Wrap an upstream body so the finished exchange reaches `sink`.
pub fn capture_body(body: Body, pending: PendingExchange, sink: Arc<dyn RecordSink>) -> Body {
    let expected_len = content_length(&pending.response_headers);
    let bodiless = expected_len == Some(0) || is_bodiless(&pending.method, pending.status);
    let tee = CaptureTee {
        upstream: body.into_data_stream(),
        captured: Vec::new(),
        expected_len,
        delivered: bodiless,
        pending: Some(pending),
        sink,
    };

    let stream = futures_util::stream::unfold(tee, |mut tee| async move {
        match tee.upstream.next().await {
            Some(Ok(chunk)) => {
                tee.push(&chunk);
                Some((Ok(chunk), tee))
            }
            Some(Err(e)) => {
                if let Some(pending) = &tee.pending {
                    tracing::warn!(id = %pending.id, error = %e, "Upstream body failed mid-stream");
                }
                tee.abandon();
                Some((Err(e), tee))
            }
            None => {
                tee.delivered = true;
                tee.finish();
                None
            }
        }
    });

    Body::from_stream(stream)
}

fn is_bodiless(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ClassifiedBody, ExchangeId, MemorySink};
    use axum::http::{HeaderValue, Method, StatusCode};
    use serde_json::json;

    fn pending(response_headers: HeaderMap) -> PendingExchange {
        PendingExchange {
            id: ExchangeId::new(1),
            arrived_at: chrono::Utc::now(),
            path: "/api/chat".into(),
            method: Method::POST,
            request_headers: HeaderMap::new(),
            request_body: br#"{"stream":true}"#.to_vec(),
            status: StatusCode::OK,
            response_headers,
        }
    }

    fn chunked(parts: &'static [&'static str]) -> Body {
        let chunks = parts
            .iter()
            .map(|p| Ok::<_, std::io::Error>(Bytes::from_static(p.as_bytes())));
        Body::from_stream(futures_util::stream::iter(chunks))
    }

    #[tokio::test]
    async fn records_after_stream_is_drained() {
        let sink = MemorySink::new();
        let body = capture_body(
            chunked(&["{\"n\":1}\n", "{\"n\":2}\n"]),
            pending(HeaderMap::new()),
            Arc::new(sink.clone()),
        );
        assert!(sink.is_empty());

        let delivered = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&delivered[..], b"{\"n\":1}\n{\"n\":2}\n");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].response.body,
            ClassifiedBody::Sequence(vec![json!({"n": 1}), json!({"n": 2})])
        );
        assert_eq!(records[0].request.body, ClassifiedBody::Single(json!({"stream": true})));
    }

    #[tokio::test]
    async fn records_when_content_length_reached_and_body_dropped() {
        let sink = MemorySink::new();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("7"));

        let body = capture_body(
            chunked(&["{\"a\":1}", "trailing"]),
            pending(headers),
            Arc::new(sink.clone()),
        );
        let mut stream = body.into_data_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"{\"a\":1}");
        drop(stream);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response.body, ClassifiedBody::Single(json!({"a": 1})));
    }

    #[tokio::test]
    async fn early_drop_is_not_recorded() {
        let sink = MemorySink::new();
        let body = capture_body(
            chunked(&["{\"n\":1}\n", "{\"n\":2}\n"]),
            pending(HeaderMap::new()),
            Arc::new(sink.clone()),
        );
        let mut stream = body.into_data_stream();
        let _ = stream.next().await;
        drop(stream);

        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn upstream_error_is_not_recorded() {
        let sink = MemorySink::new();
        let chunks = vec![
            Ok(Bytes::from_static(b"{\"n\":1}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let body = capture_body(
            Body::from_stream(futures_util::stream::iter(chunks)),
            pending(HeaderMap::new()),
            Arc::new(sink.clone()),
        );

        assert!(axum::body::to_bytes(body, usize::MAX).await.is_err());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn empty_body_is_recorded_as_absent() {
        let sink = MemorySink::new();
        let body = capture_body(Body::empty(), pending(HeaderMap::new()), Arc::new(sink.clone()));
        let delivered = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert!(delivered.is_empty());
        assert_eq!(sink.records()[0].response.body, ClassifiedBody::Absent);
    }

    #[tokio::test]
    async fn bodiless_response_is_recorded_without_polling() {
        let sink = MemorySink::new();
        let mut exchange = pending(HeaderMap::new());
        exchange.method = Method::HEAD;

        let body = capture_body(Body::empty(), exchange, Arc::new(sink.clone()));
        drop(body);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method, "HEAD");
    }

    #[tokio::test]
    async fn zero_content_length_is_recorded_without_polling() {
        let sink = MemorySink::new();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));

        drop(capture_body(Body::empty(), pending(headers), Arc::new(sink.clone())));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn bodiless_detection() {
        assert!(is_bodiless(&Method::HEAD, StatusCode::OK));
        assert!(is_bodiless(&Method::GET, StatusCode::NO_CONTENT));
        assert!(is_bodiless(&Method::GET, StatusCode::NOT_MODIFIED));
        assert!(!is_bodiless(&Method::GET, StatusCode::OK));
    }

    #[test]
    fn content_length_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), None);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert_eq!(content_length(&headers), Some(42));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("nope"));
        assert_eq!(content_length(&headers), None);
    }
}
