//! Exchange persistence.
//!
//! # Responsibilities
//! - Accept finished exchanges from the forwarder
//! - Write one pretty-printed JSON file per exchange
//! - Absorb every persistence failure
//!
//! # Design Decisions
//! - `RecordSink::record` has no error channel; failures end in a log line
//!   and a metric
//! - Each exchange has its own filename, so concurrent writers never share a file
//! - Writes in flight are tracked; `drain` waits for them before the runtime
//!   is torn down

use futures_util::future::BoxFuture;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;

use crate::capture::record::Exchange;
use crate::observability::metrics;

/// Error raised while persisting one exchange.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to serialize exchange: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for finished exchanges.
pub trait RecordSink: Send + Sync + 'static {
    /// Hand over an exchange. Returns immediately; never fails.
    fn record(&self, exchange: Exchange);

    /// Resolve once every exchange handed over so far has been persisted
    /// (or has failed to be).
    fn drain(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Writes each exchange to `<dir>/<id>-<path>.json`.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: Arc<PathBuf>,
    writes: Arc<Mutex<JoinSet<()>>>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
            writes: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    fn writes(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        match self.writes.lock() {
            Ok(writes) => writes,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Serialize and durably write one exchange, returning the file path.
    pub async fn write(&self, exchange: &Exchange) -> Result<PathBuf, CaptureError> {
        let data = serde_json::to_vec_pretty(exchange)?;
        let path = self.dir.join(exchange.file_name());

        let io_err = |source: std::io::Error| CaptureError::Io {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::File::create(&path).await.map_err(io_err)?;
        file.write_all(&data).await.map_err(io_err)?;
        file.sync_data().await.map_err(io_err)?;

        Ok(path)
    }
}

impl RecordSink for FileSink {
    fn record(&self, exchange: Exchange) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(id = %exchange.id, error = %e, "No runtime available, exchange dropped");
                metrics::record_capture(false);
                return;
            }
        };

        let sink = self.clone();
        let mut writes = self.writes();
        // Reap finished writes so the set only holds what is in flight.
        while writes.try_join_next().is_some() {}
        writes.spawn_on(async move {
            match sink.write(&exchange).await {
                Ok(path) => {
                    tracing::debug!(id = %exchange.id, path = %path.display(), "Exchange captured");
                    metrics::record_capture(true);
                }
                Err(e) => {
                    tracing::warn!(id = %exchange.id, error = %e, "Failed to capture exchange");
                    metrics::record_capture(false);
                }
            }
        }, &handle);
    }

    fn drain(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut in_flight = std::mem::take(&mut *self.writes());
            if !in_flight.is_empty() {
                tracing::debug!(pending = in_flight.len(), "Waiting for capture writes");
            }
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "Capture write task failed");
                }
            }
        })
    }
}

/// Keeps exchanges in memory. Used by tests and embedders that persist
/// records themselves.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Exchange>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<Exchange> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn record(&self, exchange: Exchange) {
        match self.records.lock() {
            Ok(mut records) => records.push(exchange),
            Err(poisoned) => poisoned.into_inner().push(exchange),
        }
    }
}
