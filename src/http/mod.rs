//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, id + timestamp assignment)
//!     → request.rs (buffer body, rebuild request for the target)
//!     → forward.rs (upstream call, PendingExchange)
//!     → response.rs (stream body to caller, then hand exchange to sink)
//!     → Send to client
//! ```

pub mod error;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use error::ProxyError;
pub use forward::{Forwarded, Forwarder};
pub use request::Target;
pub use server::{AppState, HttpServer};
