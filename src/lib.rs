//! Resilient streaming telemetry client.
//!
//! Telemlink keeps a websocket session to a telemetry device alive, decodes
//! every message it receives and publishes the results to any number of
//! observers.
//!
//! # Features
//!
//! - **Reconnect loop**: bounded exponential backoff (500 ms doubling to 30 s),
//!   reset after every healthy session
//! - **Decoding**: `T:` telemetry lines, `name=value` text, raw text and
//!   binary previews
//! - **Last-value state**: the newest [`TelemetrySample`] is always available
//! - **Bounded log**: 10,000 lines with a scrollable viewport
//!
//! ## Example
//!
//! ```rust,no_run
//! use telemlink::{Telemlink, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> telemlink::Result<()> {
//!     let client = Telemlink::connect("ws://192.168.1.88/ws")?;
//!     let mut samples = client.telemetry(UpdateRate::Max(10));
//!
//!     while let Some(sample) = samples.next().await {
//!         println!("{sample}");
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod backoff;
pub mod config;
pub mod decoder;
pub mod endpoint;
mod error;
pub mod types;

// Shared state
pub mod log_sink;
pub mod telemetry_state;

// Connection loop
pub mod connection;
pub mod driver;
pub mod stream;
pub mod transport;
pub mod transports;

// Core exports
pub use endpoint::Endpoint;
pub use error::*;
pub use types::*;

pub use backoff::{Backoff, BackoffState};
pub use config::{ClientConfig, ConnectProfile};
pub use connection::TelemetryClient;
pub use log_sink::{LogBuffer, LogSink, LogView};
pub use telemetry_state::TelemetryState;
pub use transport::{CloseInfo, Connector, Incoming, Link};
pub use transports::{ReplayConnector, SimulatedConnector, WebSocketConnector};

/// Unified entry point for telemetry clients.
///
/// Every constructor spawns the connection loop on the current tokio runtime
/// and returns immediately; the first connect attempt happens in the
/// background.
///
/// # Examples
///
/// ## Device over websocket
/// ```rust,no_run
/// use telemlink::Telemlink;
///
/// #[tokio::main]
/// async fn main() -> telemlink::Result<()> {
///     let client = Telemlink::connect("ws://192.168.1.88/ws")?;
///     // Use client...
///     client.shutdown().await;
///     Ok(())
/// }
/// ```
///
/// ## Simulated data
/// ```rust,no_run
/// use telemlink::Telemlink;
///
/// #[tokio::main]
/// async fn main() -> telemlink::Result<()> {
///     let client = Telemlink::simulate()?;
///     println!("{:?}", client.latest());
///     Ok(())
/// }
/// ```
pub struct Telemlink;

impl Telemlink {
    /// Connect to a `ws://` or `wss://` endpoint with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is not an absolute ws/wss URI with a host.
    /// Network failures are never returned here; the loop logs them and retries.
    pub fn connect(uri: &str) -> Result<TelemetryClient> {
        TelemetryClient::spawn(ClientConfig::new(uri))
    }

    /// Start a client from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure of `config`.
    pub fn connect_with(config: ClientConfig) -> Result<TelemetryClient> {
        TelemetryClient::spawn(config)
    }

    /// Start a client fed by [`SimulatedConnector`] instead of a device.
    pub fn simulate() -> Result<TelemetryClient> {
        TelemetryClient::spawn_with(ClientConfig::new("ws://simulator.local/ws"), SimulatedConnector::new())
    }
}
