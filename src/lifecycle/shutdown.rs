//! Shutdown fan-out.
//!
//! One [`Shutdown`] per process (or per test proxy). The server holds a
//! receiver and stops accepting once it fires; requests already streaming
//! are drained by axum before `run` returns.

use tokio::sync::broadcast;

use crate::lifecycle::signals;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for a server or background task. Subscribe before triggering:
    /// late subscribers miss the notification.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Repeated calls are harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Trigger on SIGINT/SIGTERM from a background task.
    pub fn trigger_on_signal(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            signals::shutdown_signal().await;
            this.trigger();
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
