//! Transport traits the connection loop drives.

use std::fmt;

use crate::types::Frame;
use crate::{Endpoint, Result};

/// Close handshake details sent by the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }

    /// 1000, normal closure
    pub fn normal(reason: impl Into<String>) -> Self {
        Self::new(1000, reason)
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.reason)
    }
}

/// One unit read from an open link
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A complete message; fragments are already reassembled
    Frame(Frame),
    /// The remote side started the close handshake
    Close(Option<CloseInfo>),
}

/// Factory for sessions against one endpoint
///
/// The connection loop calls [`Connector::connect`] once per session and
/// applies its own connect timeout and cancellation around the call.
#[async_trait::async_trait]
pub trait Connector: Send + 'static {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Link>>;
}

/// An open full-duplex message link
#[async_trait::async_trait]
pub trait Link: Send {
    /// Wait for the next complete message
    ///
    /// Returns:
    /// - `Ok(Some(incoming))` - a message or the remote close handshake
    /// - `Ok(None)` - the stream ended without a close handshake
    /// - `Err(e)` - transport failure mid-session
    ///
    /// Must be cancel-safe: the loop drops this future on shutdown.
    async fn next_message(&mut self) -> Result<Option<Incoming>>;

    /// Answer a remote close with our own close frame
    async fn acknowledge_close(&mut self) -> Result<()>;

    /// Start a client-side close
    async fn close(&mut self) -> Result<()>;

    /// Whether the link still reports an open state
    fn is_open(&self) -> bool;
}
