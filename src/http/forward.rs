//! Forwarding to the upstream inference server.
//!
//! Forwarding happens in two phases:
//! 1. [`Forwarder::forward`] buffers the inbound request, issues the upstream
//!    call and returns the upstream response together with its
//!    [`PendingExchange`]. Nothing is persisted here.
//! 2. [`Forwarded::into_response`] turns it into the caller's response and
//!    wires the capture body to a [`RecordSink`].

use axum::body::Body;
use axum::http::{response, HeaderName, HeaderValue, Request, Response, StatusCode};
use chrono::{DateTime, Utc};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::{ExchangeId, PendingExchange, RecordSink};
use crate::http::error::ProxyError;
use crate::http::request::{BufferedRequest, Target};
use crate::http::response::capture_body;

/// Issues buffered requests against the configured target.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    target: Target,
}

impl Forwarder {
    pub fn new(target: Target, connect_timeout: Option<Duration>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(connect_timeout);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client, target }
    }

    /// Forward one request. Dropping the returned future (client disconnect)
    /// cancels the upstream call.
    pub async fn forward(
        &self,
        id: ExchangeId,
        arrived_at: DateTime<Utc>,
        request: Request<Body>,
    ) -> Result<Forwarded, ProxyError> {
        let inbound = BufferedRequest::read(request).await?;
        let outbound = inbound.to_outbound(&self.target)?;

        tracing::debug!(
            id = %id,
            uri = %outbound.uri(),
            body_bytes = inbound.body.len(),
            "Forwarding upstream"
        );

        let response = self.client.request(outbound).await?;
        let (parts, body) = response.into_parts();

        let pending = PendingExchange {
            id,
            arrived_at,
            path: inbound.parts.uri.path().to_string(),
            method: inbound.parts.method,
            request_headers: inbound.parts.headers,
            request_body: inbound.body.to_vec(),
            status: parts.status,
            response_headers: parts.headers.clone(),
        };

        Ok(Forwarded {
            parts,
            body: Body::new(body),
            pending,
        })
    }
}

/// Upstream response that has not been handed to the caller yet.
pub struct Forwarded {
    parts: response::Parts,
    body: Body,
    pending: PendingExchange,
}

impl Forwarded {
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    /// Build the caller's response: upstream status and headers verbatim,
    /// plus the correlation header when configured.
    pub fn into_response(
        self,
        sink: Arc<dyn RecordSink>,
        id_header: Option<&HeaderName>,
    ) -> Response<Body> {
        let id = self.pending.id;
        let body = capture_body(self.body, self.pending, sink);
        let mut response = Response::from_parts(self.parts, body);
        if let Some(name) = id_header {
            response
                .headers_mut()
                .append(name.clone(), HeaderValue::from(id.as_u64()));
        }
        response
    }
}
