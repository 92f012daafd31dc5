//! Connection loop lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the connection loop currently is.
///
/// The loop cycles `Idle -> Connecting -> Open -> Closing -> Idle`. `Stopped`
/// is terminal and reachable from every state once the client is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Between sessions, including the backoff wait
    Idle,
    Connecting,
    Open,
    Closing,
    Stopped,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Stopped
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
