//! [`Connector`](crate::transport::Connector) implementations
//!
//! - [`websocket`] talks to real devices over ws/wss
//! - [`simulated`] generates synthetic telemetry
//! - [`replay`] plays back scripted sessions

pub mod replay;
pub mod simulated;
pub mod websocket;

pub use replay::{ReplayConnector, ReplayStats, ScriptStep, SessionScript};
pub use simulated::SimulatedConnector;
pub use websocket::{WebSocketConnector, WebSocketLink};
