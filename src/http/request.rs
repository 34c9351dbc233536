//! Inbound request buffering and outbound request construction.
//!
//! # Responsibilities
//! - Buffer the entire inbound body (needed both for forwarding and logging)
//! - Rebuild the request against the upstream target
//!
//! # Design Decisions
//! - Bodies are held in memory; the router caps their size
//! - Headers are forwarded verbatim, hop-by-hop included. Only `Host` is
//!   left for the client to fill from the target authority

use axum::body::{Body, Bytes};
use axum::http::{header, request, Request, Uri};

use crate::http::error::ProxyError;

/// Upstream base URL, without trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    base: String,
}

impl Target {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// `<target><path+query>` of the inbound URI.
    pub fn uri_for(&self, inbound: &Uri) -> Result<Uri, ProxyError> {
        let path_and_query = inbound
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri = format!("{}{}", self.base, path_and_query);
        uri.parse::<Uri>()
            .map_err(|source| ProxyError::InvalidUri { uri, source })
    }
}

/// An inbound request whose body has been read into memory.
#[derive(Debug)]
pub struct BufferedRequest {
    pub parts: request::Parts,
    pub body: Bytes,
}

impl BufferedRequest {
    /// Read the whole body. The size bound is enforced by the router's body limit layer.
    pub async fn read(request: Request<Body>) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(ProxyError::ClientBody)?;
        Ok(Self { parts, body })
    }

    /// Build the request sent upstream: same method, headers and body.
    pub fn to_outbound(&self, target: &Target) -> Result<Request<Body>, ProxyError> {
        let mut outbound = Request::new(Body::from(self.body.clone()));
        *outbound.method_mut() = self.parts.method.clone();
        *outbound.uri_mut() = target.uri_for(&self.parts.uri)?;
        *outbound.headers_mut() = self.parts.headers.clone();
        outbound.headers_mut().remove(header::HOST);
        Ok(outbound)
    }
}
