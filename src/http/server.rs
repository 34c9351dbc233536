//! HTTP server setup and the intercepting handler.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all handler
//! - Wire up middleware (tracing, body limit)
//! - Assign exchange ids and arrival timestamps
//! - Forward requests upstream and stream responses back
//! - Hand finished exchanges to the record sink

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::capture::{FileSink, RecordSink, RequestCounter};
use crate::config::InterceptorConfig;
use crate::http::error::error_chain;
use crate::http::forward::Forwarder;
use crate::http::request::Target;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub counter: Arc<RequestCounter>,
    pub forwarder: Forwarder,
    pub sink: Arc<dyn RecordSink>,
    pub id_header: Option<HeaderName>,
}

/// HTTP server for the interceptor.
pub struct HttpServer {
    router: Router,
    config: InterceptorConfig,
    counter: Arc<RequestCounter>,
    sink: Arc<dyn RecordSink>,
}

impl HttpServer {
    /// Create a server persisting exchanges under `capture.log_dir`.
    pub fn new(config: InterceptorConfig) -> Self {
        let sink = Arc::new(FileSink::new(config.capture.log_dir.clone()));
        Self::with_sink(config, sink)
    }

    /// Create a server with a custom record sink.
    pub fn with_sink(config: InterceptorConfig, sink: Arc<dyn RecordSink>) -> Self {
        let counter = Arc::new(RequestCounter::new());
        let forwarder = Forwarder::new(
            Target::new(&config.upstream.target),
            config.upstream.connect_timeout_secs.map(Duration::from_secs),
        );

        let state = AppState {
            counter: counter.clone(),
            forwarder,
            sink: sink.clone(),
            id_header: id_header(&config.capture.id_header),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            counter,
            sink,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &InterceptorConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(intercept_handler))
            .route("/", any(intercept_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.capture.max_request_body_bytes))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Counter shared with the handler.
    pub fn counter(&self) -> Arc<RequestCounter> {
        self.counter.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests
    /// and the capture writes they produced.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.config.upstream.target,
            log_dir = %self.config.capture.log_dir.display(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        self.sink.drain().await;
        tracing::info!(issued = self.counter.issued(), "HTTP server stopped");
        Ok(())
    }
}

fn id_header(raw: &str) -> Option<HeaderName> {
    if raw.is_empty() {
        return None;
    }
    match HeaderName::from_bytes(raw.as_bytes()) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::warn!(header = %raw, error = %e, "Invalid id header, correlation disabled");
            None
        }
    }
}

/// Catch-all handler: forward, stream back, capture.
async fn intercept_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let id = state.counter.next_id();
    let arrived_at = chrono::Utc::now();
    let start = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    match state.forwarder.forward(id, arrived_at, request).await {
        Ok(forwarded) => {
            let status = forwarded.status();
            tracing::info!(
                id = %id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Proxied request"
            );
            metrics::record_request(&method, status.as_u16(), start);
            forwarded.into_response(state.sink.clone(), state.id_header.as_ref())
        }
        Err(e) => {
            tracing::warn!(
                id = %id,
                method = %method,
                path = %path,
                error = %error_chain(&e),
                "Forwarding failed, exchange not captured"
            );
            metrics::record_upstream_failure(&method);
            metrics::record_request(&method, e.status().as_u16(), start);
            e.into_response()
        }
    }
}
