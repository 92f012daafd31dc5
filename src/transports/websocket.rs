//! Websocket transport over tokio-tungstenite

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::transport::{CloseInfo, Connector, Incoming, Link};
use crate::types::Frame;
use crate::{Endpoint, LinkError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one websocket per session
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    keep_alive: Option<Duration>,
}

impl WebSocketConnector {
    /// `keep_alive` is the ping interval while idle; `None` disables pings.
    pub fn new(keep_alive: Option<Duration>) -> Self {
        Self { keep_alive: keep_alive.filter(|d| !d.is_zero()) }
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Link>> {
        let url = endpoint.websocket_url();
        debug!(%url, "Opening websocket");

        let (socket, response) = connect_async(url.as_str())
            .await
            .map_err(|e| LinkError::connect_failed_with_source(e.to_string(), Box::new(e)))?;

        debug!(status = %response.status(), "Websocket handshake complete");
        Ok(Box::new(WebSocketLink::new(socket, self.keep_alive)))
    }
}

/// Open websocket session
///
/// Fragment reassembly and ping replies are handled by tungstenite; this type
/// only surfaces complete text/binary messages and the close handshake.
pub struct WebSocketLink {
    socket: Socket,
    keep_alive: Option<Interval>,
    open: bool,
}

enum Wake {
    Message(Option<std::result::Result<Message, tungstenite::Error>>),
    Ping,
}

impl WebSocketLink {
    fn new(socket: Socket, keep_alive: Option<Duration>) -> Self {
        let keep_alive = keep_alive.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        Self { socket, keep_alive, open: true }
    }
}

fn transport_error(context: &str, err: tungstenite::Error) -> LinkError {
    let code = match &err {
        tungstenite::Error::Protocol(_) => Some(u16::from(CloseCode::Protocol)),
        tungstenite::Error::Capacity(_) => Some(u16::from(CloseCode::Size)),
        _ => None,
    };
    LinkError::Transport { reason: format!("{context}: {err}"), code, source: Some(Box::new(err)) }
}

/// Close results that only mean the handshake already finished
fn close_outcome(result: std::result::Result<(), tungstenite::Error>) -> Result<()> {
    match result {
        Ok(())
        | Err(tungstenite::Error::ConnectionClosed)
        | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
        Err(e) => Err(transport_error("close failed", e)),
    }
}

#[async_trait::async_trait]
impl Link for WebSocketLink {
    async fn next_message(&mut self) -> Result<Option<Incoming>> {
        loop {
            let wake = match self.keep_alive.as_mut() {
                Some(ticker) => tokio::select! {
                    message = self.socket.next() => Wake::Message(message),
                    _ = ticker.tick() => Wake::Ping,
                },
                None => Wake::Message(self.socket.next().await),
            };

            let message = match wake {
                Wake::Ping => {
                    trace!("Sending keep-alive ping");
                    if let Err(e) = self.socket.send(Message::Ping(Vec::new())).await {
                        self.open = false;
                        return Err(transport_error("keep-alive ping failed", e));
                    }
                    continue;
                }
                Wake::Message(None) => {
                    self.open = false;
                    return Ok(None);
                }
                Wake::Message(Some(Err(e))) => {
                    self.open = false;
                    return Err(transport_error("receive failed", e));
                }
                Wake::Message(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => return Ok(Some(Incoming::Frame(Frame::text(text)))),
                Message::Binary(data) => return Ok(Some(Incoming::Frame(Frame::binary(data)))),
                Message::Close(frame) => {
                    self.open = false;
                    let info = frame.map(|f| CloseInfo::new(u16::from(f.code), f.reason.into_owned()));
                    return Ok(Some(Incoming::Close(info)));
                }
                // pings are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn acknowledge_close(&mut self) -> Result<()> {
        let reply = CloseFrame { code: CloseCode::Normal, reason: "Client ack".into() };
        close_outcome(self.socket.close(Some(reply)).await)
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        let frame = CloseFrame { code: CloseCode::Normal, reason: "Client done".into() };
        close_outcome(self.socket.close(Some(frame)).await)
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
