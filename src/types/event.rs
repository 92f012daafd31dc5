//! Decoder output and its user-visible log rendering

use std::sync::Arc;

use super::{ConnectionState, KeyValueSet, LogLine, TelemetrySample};

/// Hexadecimal (and optional base64) preview of a binary frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPreview {
    /// Full payload length in bytes
    pub len: usize,
    /// Uppercase hex of at most the first 128 bytes, `...` appended when cut
    pub hex: String,
    /// At most the first 256 characters of the standard base64 encoding
    pub base64: String,
}

impl BinaryPreview {
    pub fn is_truncated(&self) -> bool {
        self.hex.ends_with("...")
    }
}

/// Result of decoding one frame
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    /// `T:` line with at least three fields
    Telemetry(TelemetrySample),
    /// Generic text carrying `name=value` tokens
    KeyValues { text: String, pairs: KeyValueSet },
    /// Text with neither telemetry nor key/value content
    RawText(String),
    Binary(BinaryPreview),
}

impl DecodedEvent {
    /// Log lines shown to the user for this event.
    ///
    /// Text events always log the line itself first; key/value events follow it
    /// with one `key = value` line per distinct key.
    pub fn log_lines(&self, include_base64: bool) -> Vec<String> {
        match self {
            DecodedEvent::Telemetry(sample) => vec![sample.raw_line.clone()],
            DecodedEvent::KeyValues { text, pairs } => std::iter::once(text.clone())
                .chain(pairs.iter().map(|(k, v)| format!("{k} = {v}")))
                .collect(),
            DecodedEvent::RawText(text) => vec![text.clone()],
            DecodedEvent::Binary(preview) => {
                let mut lines = vec![format!("Binary preview (hex): {}", preview.hex)];
                if include_base64 {
                    lines.push(format!("Base64 (first 256 chars): {}", preview.base64));
                }
                lines
            }
        }
    }

    pub fn as_telemetry(&self) -> Option<&TelemetrySample> {
        match self {
            DecodedEvent::Telemetry(sample) => Some(sample),
            _ => None,
        }
    }
}

/// Notification published by a running client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A line was appended to the log sink
    Log(LogLine),
    /// A new telemetry sample replaced the previous one
    Telemetry(Arc<TelemetrySample>),
    /// The connection loop changed state
    State(ConnectionState),
}
