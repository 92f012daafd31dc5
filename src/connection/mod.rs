//! Running telemetry client and its observer API

use std::sync::Arc;

use futures::{Stream, StreamExt, stream::BoxStream};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::driver::{Driver, DriverSettings, Outputs};
use crate::log_sink::{LogSink, LogView};
use crate::stream::ThrottleExt;
use crate::telemetry_state::TelemetryState;
use crate::transport::Connector;
use crate::transports::WebSocketConnector;
use crate::types::{ClientEvent, ConnectionState, LogLine, TelemetrySample, UpdateRate};
use crate::{Endpoint, Result};

#[cfg(test)]
mod tests;

/// Handle to a running connection loop
///
/// The loop keeps reconnecting until [`TelemetryClient::shutdown`] or
/// [`TelemetryClient::stop`] is called, or the client is dropped.
pub struct TelemetryClient {
    endpoint: Endpoint,
    telemetry: TelemetryState,
    logs: Arc<LogSink>,
    events: broadcast::Sender<ClientEvent>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TelemetryClient {
    /// Validate `config` and start a websocket client.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(config: ClientConfig) -> Result<Self> {
        let connector = WebSocketConnector::new(config.keep_alive());
        Self::spawn_with(config, connector)
    }

    /// Validate `config` and start a client over any transport.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_with<C>(config: ClientConfig, connector: C) -> Result<Self>
    where
        C: Connector,
    {
        config.validate()?;
        let endpoint = config.endpoint()?;

        let logs = Arc::new(LogSink::new(config.log_capacity, config.view_height));
        let telemetry = TelemetryState::new();
        let (events, _) = broadcast::channel(config.event_capacity);

        let outputs = Outputs { logs: Arc::clone(&logs), telemetry: telemetry.clone(), events: events.clone() };
        let channels =
            Driver::spawn(connector, endpoint.clone(), DriverSettings::from_config(&config), outputs);

        info!(%endpoint, profile = ?config.profile, "Telemetry client started");

        Ok(Self {
            endpoint,
            telemetry,
            logs,
            events,
            state: channels.state,
            cancel: channels.cancel,
            task: Some(channels.task),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Most recent telemetry sample, if any has arrived
    pub fn latest(&self) -> Option<Arc<TelemetrySample>> {
        self.telemetry.latest()
    }

    pub fn telemetry_state(&self) -> &TelemetryState {
        &self.telemetry
    }

    /// Telemetry samples at the requested rate
    ///
    /// Yields the current sample first when one exists. Slow readers skip to
    /// the newest sample rather than queueing.
    pub fn telemetry(&self, rate: UpdateRate) -> BoxStream<'static, Arc<TelemetrySample>> {
        let samples = self.telemetry.changes();
        match rate.interval() {
            None => samples.boxed(),
            Some(interval) => samples.throttle(interval).boxed(),
        }
    }

    /// Every event published after this call
    ///
    /// A subscriber that falls more than the configured event capacity behind
    /// skips the oldest events and a warning is traced.
    pub fn events(&self) -> impl Stream<Item = ClientEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {skipped} events");
                    None
                }
            }
        })
    }

    /// Log lines appended after this call; earlier lines are in [`Self::log_sink`].
    pub fn log_lines(&self) -> impl Stream<Item = LogLine> + Send + 'static {
        self.events().filter_map(|event| async move {
            match event {
                ClientEvent::Log(line) => Some(line),
                _ => None,
            }
        })
    }

    pub fn log_sink(&self) -> &Arc<LogSink> {
        &self.logs
    }

    /// Current visible window of the log
    pub fn log_view(&self) -> LogView {
        self.logs.view()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Current state first, then every change
    pub fn state_changes(&self) -> impl Stream<Item = ConnectionState> + Send + 'static {
        WatchStream::new(self.state.clone())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request shutdown without waiting for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancel the loop and wait until it has logged its final line.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Connection loop ended abnormally: {e}");
            }
        }
        debug!(endpoint = %self.endpoint, "Telemetry client shut down");
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        debug!("Dropping telemetry client");
        self.cancel.cancel();
    }
}
