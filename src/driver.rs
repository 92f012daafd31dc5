//! Driver spawns and runs the reconnecting connection loop

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backoff::{Backoff, BackoffState};
use crate::config::ClientConfig;
use crate::decoder;
use crate::log_sink::LogSink;
use crate::telemetry_state::TelemetryState;
use crate::transport::{CloseInfo, Connector, Incoming, Link};
use crate::types::{ClientEvent, ConnectionState, DecodedEvent, Frame, LogLine, TelemetrySample};
use crate::{Endpoint, LinkError};

/// Upper bound on the best-effort close handshake writes at the end of a session
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Loop parameters derived from a [`ClientConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub connect_timeout: Duration,
    pub backoff: Backoff,
    pub log_frame_headers: bool,
    pub binary_base64: bool,
}

impl DriverSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            backoff: config.backoff.policy(),
            log_frame_headers: config.log_frame_headers,
            binary_base64: config.binary_base64,
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Shared sinks the loop publishes into
#[derive(Debug, Clone)]
pub struct Outputs {
    pub logs: Arc<LogSink>,
    pub telemetry: TelemetryState,
    pub events: broadcast::Sender<ClientEvent>,
}

/// Result of spawning the connection loop
pub struct DriverChannels {
    /// Receiver for lifecycle state
    pub state: watch::Receiver<ConnectionState>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Completes after the loop has logged its final line
    pub task: JoinHandle<()>,
}

/// How a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Connect failed or timed out
    ConnectFailed(LinkError),
    /// The remote side sent a close frame
    RemoteClose(Option<CloseInfo>),
    /// Receive failed mid-session
    TransportError(LinkError),
    /// The stream ended without a close handshake
    StreamEnded,
    Cancelled,
}

/// Per-session bookkeeping, reported when the session ends
#[derive(Debug)]
pub struct SessionSummary {
    pub attempt: u64,
    pub frames: u64,
    /// At least one non-empty message arrived
    pub got_any_data: bool,
    pub end: SessionEnd,
}

impl SessionSummary {
    fn new(attempt: u64, end: SessionEnd) -> Self {
        Self { attempt, frames: 0, got_any_data: false, end }
    }

    /// A session that closed cleanly or delivered data resets the backoff.
    pub fn is_healthy(&self) -> bool {
        self.got_any_data || matches!(self.end, SessionEnd::RemoteClose(_))
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = match &self.end {
            SessionEnd::ConnectFailed(_) => "connect failed",
            SessionEnd::RemoteClose(_) => "remote close",
            SessionEnd::TransportError(_) => "transport error",
            SessionEnd::StreamEnded => "stream ended",
            SessionEnd::Cancelled => "cancelled",
        };
        write!(f, "attempt {} ended by {end} after {} frames", self.attempt, self.frames)
    }
}

/// Writes to every output of the loop
struct Publisher {
    outputs: Outputs,
    state: watch::Sender<ConnectionState>,
}

impl Publisher {
    fn log(&self, text: impl Into<String>) {
        let line = LogLine::now(text);
        debug!(target: "telemlink::log", "{}", line.text);
        self.outputs.logs.append(line.clone());
        // no subscribers is fine
        let _ = self.outputs.events.send(ClientEvent::Log(line));
    }

    fn publish(&self, sample: TelemetrySample) {
        let sample = self.outputs.telemetry.update(sample);
        let _ = self.outputs.events.send(ClientEvent::Telemetry(sample));
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            trace!("State {previous} -> {state}");
            let _ = self.outputs.events.send(ClientEvent::State(state));
        }
    }

    fn report(&self, err: &LinkError) {
        warn!(error = %err, "Session failed");
        self.log(err.to_string());
        if let Some(detail) = err.diagnostic() {
            self.log(detail);
        }
    }
}

/// Driver spawns and manages the connection loop task
///
/// The task owns the [`Connector`] and runs sessions back to back until the
/// cancellation token fires, sleeping a backoff delay between sessions.
pub struct Driver;

impl Driver {
    /// Spawn the connection loop for `endpoint`
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn<C>(
        connector: C,
        endpoint: Endpoint,
        settings: DriverSettings,
        outputs: Outputs,
    ) -> DriverChannels
    where
        C: Connector,
    {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let cancel = CancellationToken::new();
        let publisher = Publisher { outputs, state: state_tx };

        let cancel_loop = cancel.clone();
        let task = tokio::spawn(async move {
            Self::connection_task(connector, endpoint, settings, publisher, cancel_loop).await;
        });

        DriverChannels { state: state_rx, cancel, task }
    }

    async fn connection_task<C>(
        mut connector: C,
        endpoint: Endpoint,
        settings: DriverSettings,
        out: Publisher,
        cancel: CancellationToken,
    ) where
        C: Connector,
    {
        info!(%endpoint, "Connection loop started");
        out.log(format!("[WS] Connecting to {endpoint}..."));

        let mut backoff = BackoffState::new(settings.backoff);
        let mut attempt = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            attempt += 1;

            let summary =
                Self::run_session(&mut connector, &endpoint, &settings, &out, &cancel, attempt)
                    .await;
            if matches!(summary.end, SessionEnd::Cancelled) || cancel.is_cancelled() {
                debug!("Session cancelled: {summary}");
                break;
            }

            let healthy = summary.is_healthy();
            info!(healthy, "Session {summary}");

            out.set_state(ConnectionState::Idle);
            let delay = backoff.schedule(healthy);
            out.log(format!("Reconnecting in {}ms...", delay.as_millis()));

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Backoff wait cancelled");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        out.set_state(ConnectionState::Stopped);
        out.log("Listener stopped.");
        info!("Connection loop ended after {attempt} attempts");
    }

    async fn run_session<C>(
        connector: &mut C,
        endpoint: &Endpoint,
        settings: &DriverSettings,
        out: &Publisher,
        cancel: &CancellationToken,
        attempt: u64,
    ) -> SessionSummary
    where
        C: Connector,
    {
        out.set_state(ConnectionState::Connecting);
        debug!(attempt, "Connecting");

        let connect = tokio::time::timeout(settings.connect_timeout, connector.connect(endpoint));
        let connected = tokio::select! {
            _ = cancel.cancelled() => return SessionSummary::new(attempt, SessionEnd::Cancelled),
            connected = connect => connected,
        };

        let mut link = match connected {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                out.report(&e);
                return SessionSummary::new(attempt, SessionEnd::ConnectFailed(e));
            }
            Err(_) => {
                let e = LinkError::Timeout { duration: settings.connect_timeout };
                out.report(&e);
                return SessionSummary::new(attempt, SessionEnd::ConnectFailed(e));
            }
        };

        out.set_state(ConnectionState::Open);
        out.log("Connected. Receiving frames until shutdown or remote close...");

        let mut summary = SessionSummary::new(attempt, SessionEnd::StreamEnded);
        let end = loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break SessionEnd::Cancelled,
                next = link.next_message() => next,
            };

            match next {
                Ok(Some(Incoming::Frame(frame))) => {
                    summary.frames += 1;
                    if !frame.is_empty() {
                        summary.got_any_data = true;
                    }
                    Self::dispatch(&frame, settings, out);
                }
                Ok(Some(Incoming::Close(info))) => {
                    match &info {
                        Some(info) => out.log(format!("Server sent close: {info}")),
                        None => out.log("Server sent close without status"),
                    }
                    Self::acknowledge_quietly(link.as_mut(), cancel).await;
                    break SessionEnd::RemoteClose(info);
                }
                Ok(None) => {
                    out.log("Connection ended without close handshake");
                    break SessionEnd::StreamEnded;
                }
                Err(e) => {
                    out.report(&e);
                    break SessionEnd::TransportError(e);
                }
            }
        };
        summary.end = end;

        out.set_state(ConnectionState::Closing);
        Self::close_quietly(link.as_mut()).await;
        summary
    }

    /// Answer a remote close; a peer that stops reading cannot hold the loop.
    async fn acknowledge_quietly(link: &mut dyn Link, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => debug!("Close acknowledgement cancelled"),
            acked = tokio::time::timeout(CLOSE_TIMEOUT, link.acknowledge_close()) => match acked {
                Ok(Ok(())) => trace!("Remote close acknowledged"),
                Ok(Err(e)) => debug!("Close acknowledgement failed: {e}"),
                Err(_) => debug!("Close acknowledgement timed out after {CLOSE_TIMEOUT:?}"),
            },
        }
    }

    async fn close_quietly(link: &mut dyn Link) {
        if !link.is_open() {
            return;
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, link.close()).await {
            Ok(Ok(())) => trace!("Link closed"),
            Ok(Err(e)) => debug!("Ignoring close failure: {e}"),
            Err(_) => debug!("Close timed out after {CLOSE_TIMEOUT:?}"),
        }
    }

    /// Decode one frame and publish its log lines and telemetry.
    fn dispatch(frame: &Frame, settings: &DriverSettings, out: &Publisher) {
        if settings.log_frame_headers {
            out.log(format!(
                "{} Frame -> type={} length={}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                frame.kind,
                frame.len()
            ));
        }

        let event = decoder::decode(frame);
        for line in event.log_lines(settings.binary_base64) {
            out.log(line);
        }
        if let DecodedEvent::Telemetry(sample) = event {
            out.publish(sample);
        }
    }
}
