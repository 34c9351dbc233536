//! Transparent capturing proxy for local inference servers.
//!
//! Forwards every request to the configured upstream unmodified, streams the
//! response back, and persists each exchange as one JSON record.

// Core subsystems
pub mod capture;
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

// Reading captures back
pub mod inspect;

pub use capture::{ClassifiedBody, Exchange, RecordSink};
pub use config::InterceptorConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
