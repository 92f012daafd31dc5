//! Complete transport messages handed to the decoder

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Message type as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Text,
    Binary,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Text => f.write_str("Text"),
            FrameKind::Binary => f.write_str("Binary"),
        }
    }
}

/// One complete application message, reassembled from all of its fragments.
///
/// Text frames carry the raw bytes as received; UTF-8 validation is left to
/// the decoder so that bad input degrades instead of failing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Arc<[u8]>,
}

impl Frame {
    pub fn new(kind: FrameKind, payload: Vec<u8>) -> Self {
        Self { kind, payload: payload.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Text, text.into().into_bytes())
    }

    pub fn binary(payload: Vec<u8>) -> Self {
        Self::new(FrameKind::Binary, payload)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
