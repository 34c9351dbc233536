//! Exchange id sequencing.
//!
//! # Responsibilities
//! - Hand out one id per inbound request, at arrival
//! - Correlate log filenames, records and the response header
//!
//! # Design Decisions
//! - The counter lives in the server state, so tests get a fresh sequence
//! - Ids only need to be unique within one process run

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one proxied exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic request counter, starting at 1.
#[derive(Debug, Default)]
pub struct RequestCounter {
    issued: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id. Safe to call from any number of tasks.
    pub fn next_id(&self) -> ExchangeId {
        // Only uniqueness is required of the sequence.
        ExchangeId(self.issued.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}
