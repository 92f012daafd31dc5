//! Timestamped user-visible log line

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl LogLine {
    /// Stamp `text` with the current wall clock
    pub fn now(text: impl Into<String>) -> Self {
        Self { timestamp: Utc::now(), text: text.into() }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.timestamp.format("%H:%M:%S"), self.text)
    }
}
