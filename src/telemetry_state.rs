//! Most recent telemetry sample, shared between the connection loop and
//! presentation code.
//!
//! Backed by a [`watch`] channel: one writer replaces the value, any number of
//! readers borrow it or wait for the next change. No history is kept.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::TelemetrySample;

/// Last-value-wins telemetry store. Cloning shares the same slot.
#[derive(Debug, Clone)]
pub struct TelemetryState {
    slot: Arc<watch::Sender<Option<Arc<TelemetrySample>>>>,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// Replace the stored sample, returning the shared handle to it.
    pub fn update(&self, sample: TelemetrySample) -> Arc<TelemetrySample> {
        let sample = Arc::new(sample);
        self.slot.send_replace(Some(Arc::clone(&sample)));
        sample
    }

    pub fn latest(&self) -> Option<Arc<TelemetrySample>> {
        self.slot.borrow().clone()
    }

    /// Raw watch receiver, for callers that want `changed().await`.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<TelemetrySample>>> {
        self.slot.subscribe()
    }

    /// Stream of samples: the current one (if any) first, then every change.
    /// Readers that fall behind only see the newest sample.
    pub fn changes(&self) -> impl Stream<Item = Arc<TelemetrySample>> + Send + 'static {
        WatchStream::new(self.slot.subscribe()).filter_map(|opt| async move { opt })
    }
}
