//! Error types for the telemetry client.
//!
//! Errors fall into three groups that the connection loop treats differently:
//!
//! - **Configuration errors**: invalid endpoint URI or scheme, out-of-range
//!   settings. Raised at construction and never retried.
//! - **Connect errors**: refused connections, DNS failures, handshake
//!   timeouts. Retried with backoff until the client is cancelled.
//! - **Transport errors**: abrupt disconnects and protocol violations while a
//!   session is open. Logged with diagnostic detail and retried.
//!
//! Decoding never produces an error; malformed payloads degrade to sentinel
//! values instead (see [`crate::decoder`]).
//!
//! ```rust
//! use telemlink::LinkError;
//!
//! let error = LinkError::connect_failed("connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for client operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Invalid endpoint '{uri}': {reason}")]
    InvalidEndpoint { uri: String, reason: String },

    #[error("Invalid configuration for '{field}': {reason}")]
    Config { field: String, reason: String },

    #[error("Failed to read configuration file {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Connect failed: {reason}")]
    Connect {
        reason: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Connect attempt timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        code: Option<u16>,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl LinkError {
    /// Returns whether the connection loop should retry after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::InvalidEndpoint { .. } => false,
            LinkError::Config { .. } => false,
            LinkError::ConfigFile { .. } => false,
            LinkError::Parse { .. } => false,
            LinkError::Connect { .. } => true,
            LinkError::Timeout { .. } => true,
            LinkError::Transport { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::InvalidEndpoint { .. } => vec![
                "Use an absolute URI such as ws://192.168.1.88/ws",
                "Only ws:// and wss:// are accepted for raw sockets",
                "Use http:// or https:// only with a hub endpoint",
            ],
            LinkError::Config { .. } => vec![
                "Check the value against the documented defaults",
                "Remove the field to fall back to its default",
            ],
            LinkError::ConfigFile { .. } => vec![
                "Check the configuration file exists and is readable",
                "Check file permissions",
            ],
            LinkError::Parse { .. } => vec![
                "Check the configuration file is valid YAML",
                "Verify field names and value types",
            ],
            LinkError::Connect { .. } => vec![
                "Check the device is powered and on the network",
                "Verify host, port and path of the endpoint",
                "Check firewall rules between client and device",
            ],
            LinkError::Timeout { .. } => vec![
                "Increase the connect timeout for slow embedded peers",
                "Check network latency to the device",
            ],
            LinkError::Transport { .. } => vec![
                "Check the device did not reboot or drop off the network",
                "Check signal quality on wireless links",
                "Enable keep-alive pings if idle connections are dropped",
            ],
        }
    }

    /// Extra detail line for the user-visible log.
    ///
    /// Reports the close code carried by transport errors and the first
    /// underlying socket error found in the source chain.
    pub fn diagnostic(&self) -> Option<String> {
        let code = match self {
            LinkError::Transport { code, .. } => *code,
            _ => None,
        };
        let io = self.io_source();

        match (code, io) {
            (None, None) => None,
            (Some(code), None) => Some(format!("Transport detail: code={code}")),
            (code, Some(io)) => {
                let os = io.raw_os_error().map_or_else(|| "none".to_string(), |c| c.to_string());
                let prefix = code.map(|c| format!("code={c}, ")).unwrap_or_default();
                Some(format!(
                    "Socket detail: {prefix}kind={:?}, os_code={os}, message={io}",
                    io.kind()
                ))
            }
        }
    }

    /// First [`std::io::Error`] in the source chain, if any.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                return Some(io);
            }
            current = err.source();
        }
        None
    }

    /// Helper constructor for endpoint validation errors.
    pub fn invalid_endpoint(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        LinkError::InvalidEndpoint { uri: uri.into(), reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LinkError::Config { field: field.into(), reason: reason.into() }
    }

    /// Helper constructor for connect errors.
    pub fn connect_failed(reason: impl Into<String>) -> Self {
        LinkError::Connect { reason: reason.into(), source: None }
    }

    /// Helper constructor for connect errors with source.
    pub fn connect_failed_with_source(reason: impl Into<String>, source: BoxedSource) -> Self {
        LinkError::Connect { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for mid-session transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        LinkError::Transport { reason: reason.into(), code: None, source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(reason: impl Into<String>, source: BoxedSource) -> Self {
        LinkError::Transport { reason: reason.into(), code: None, source: Some(source) }
    }
}
