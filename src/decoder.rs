//! Frame decoder.
//!
//! Turns one complete [`Frame`] into a [`DecodedEvent`]. Decoding is total:
//! invalid UTF-8 becomes the [`INVALID_UTF8`] sentinel, unparsable numbers
//! become absent fields, and text that is neither telemetry nor key/value
//! content comes back as [`DecodedEvent::RawText`].
//!
//! Text classification, in order:
//!
//! 1. `T:` prefix (any case, after trimming) with at least three
//!    comma-separated fields: a [`TelemetrySample`]. Fields are read in the
//!    order roll, pitch, yaw, custom1, custom2.
//! 2. One or more `name=value` tokens: a [`KeyValueSet`]. Names are
//!    `[A-Za-z0-9_]+`, whitespace around `=` is allowed, values run to the
//!    next whitespace.
//! 3. Anything else: the line itself.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};

use crate::types::{BinaryPreview, DecodedEvent, Frame, FrameKind, KeyValueSet, TelemetrySample};

/// Text substituted for a text frame that is not valid UTF-8
pub const INVALID_UTF8: &str = "<invalid-utf8>";

/// Prefix marking a telemetry line
pub const TELEMETRY_PREFIX: &str = "T:";

/// Fewer fields than this and a `T:` line is not treated as telemetry
pub const MIN_TELEMETRY_FIELDS: usize = 3;

/// Bytes shown in the hex preview of a binary frame
pub const HEX_PREVIEW_BYTES: usize = 128;

/// Characters of base64 kept for a binary frame
pub const BASE64_PREVIEW_CHARS: usize = 256;

/// Decode a frame, stamping telemetry with the current wall clock.
pub fn decode(frame: &Frame) -> DecodedEvent {
    decode_at(frame, Utc::now())
}

/// Decode a frame with an explicit capture time.
pub fn decode_at(frame: &Frame, now: DateTime<Utc>) -> DecodedEvent {
    match frame.kind {
        FrameKind::Text => decode_text(&safe_utf8(&frame.payload), now),
        FrameKind::Binary => DecodedEvent::Binary(binary_preview(&frame.payload)),
    }
}

/// Classify an already-decoded text message.
pub fn decode_text(text: &str, now: DateTime<Utc>) -> DecodedEvent {
    if let Some(sample) = parse_telemetry(text, now) {
        return DecodedEvent::Telemetry(sample);
    }

    let pairs = parse_key_values(text);
    if pairs.is_empty() {
        DecodedEvent::RawText(text.to_string())
    } else {
        DecodedEvent::KeyValues { text: text.to_string(), pairs }
    }
}

pub fn safe_utf8(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Borrowed(INVALID_UTF8),
    }
}

/// Parse a `T:` telemetry line.
///
/// Returns `None` when the prefix is missing or fewer than
/// [`MIN_TELEMETRY_FIELDS`] fields are present. Extra fields past the fifth
/// are ignored.
pub fn parse_telemetry(line: &str, now: DateTime<Utc>) -> Option<TelemetrySample> {
    let body = strip_prefix_ignore_case(line.trim(), TELEMETRY_PREFIX)?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() < MIN_TELEMETRY_FIELDS {
        return None;
    }

    let mut fields = [None; 5];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = parse_number(part);
    }

    Some(TelemetrySample::from_fields(now, fields, line))
}

/// Locale-independent float parse; non-finite results count as out of range.
fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) { text.get(prefix.len()..) } else { None }
}

/// Scan `text` for `name=value` tokens.
pub fn parse_key_values(text: &str) -> KeyValueSet {
    let mut set = KeyValueSet::new();
    let mut pos = 0;

    while pos < text.len() {
        match match_pair(text, pos) {
            Some((key, value, end)) => {
                set.insert(key, value);
                pos = end;
            }
            None => pos += 1,
        }
    }

    set
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..].find(|c: char| !c.is_whitespace()).map_or(text.len(), |offset| from + offset)
}

/// Try to match one pair starting exactly at `start`.
/// Returns key, value and the byte offset just past the value.
fn match_pair(text: &str, start: usize) -> Option<(&str, &str, usize)> {
    let bytes = text.as_bytes();

    let mut pos = start;
    while pos < bytes.len() && is_name_byte(bytes[pos]) {
        pos += 1;
    }
    if pos == start {
        return None;
    }
    let key = &text[start..pos];

    pos = skip_whitespace(text, pos);
    if bytes.get(pos) != Some(&b'=') {
        return None;
    }
    let value_start = skip_whitespace(text, pos + 1);
    let value_end = text[value_start..]
        .find(char::is_whitespace)
        .map_or(text.len(), |offset| value_start + offset);
    if value_end == value_start {
        return None;
    }

    Some((key, &text[value_start..value_end], value_end))
}

/// Hex and base64 previews of a binary payload.
pub fn binary_preview(payload: &[u8]) -> BinaryPreview {
    let shown = &payload[..payload.len().min(HEX_PREVIEW_BYTES)];
    let mut hex = hex::encode_upper(shown);
    if payload.len() > HEX_PREVIEW_BYTES {
        hex.push_str("...");
    }

    // every 3 input bytes become 4 characters, so this prefix encodes to
    // exactly the first BASE64_PREVIEW_CHARS characters of the full encoding
    let head = &payload[..payload.len().min(BASE64_PREVIEW_CHARS / 4 * 3)];
    let base64 = STANDARD.encode(head);

    BinaryPreview { len: payload.len(), hex, base64 }
}
