//! Exchange capture subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → sequence.rs (assign ExchangeId)
//!     → [http forwards and streams the response]
//!     → record.rs (PendingExchange → Exchange)
//!     → classify.rs (request/response bodies → ClassifiedBody)
//!     → sink.rs (one JSON artifact per exchange)
//! ```
//!
//! # Design Decisions
//! - An Exchange is built once and never mutated afterwards
//! - Sinks are fire-and-forget: a failed write never reaches the caller
//! - Ids come from a counter owned by the server, not a process global

pub mod classify;
pub mod record;
pub mod sequence;
pub mod sink;

pub use classify::{classify, ClassifiedBody};
pub use record::{CapturedRequest, CapturedResponse, Exchange, HeaderMultiMap, PendingExchange};
pub use sequence::{ExchangeId, RequestCounter};
pub use sink::{CaptureError, FileSink, MemorySink, RecordSink};
