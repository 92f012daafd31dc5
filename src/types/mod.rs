//! Core data model for the telemetry client.
//!
//! ## Architecture
//!
//! Data flows one way through these types:
//! - a transport yields a complete [`Frame`] per message
//! - the decoder turns it into a [`DecodedEvent`]
//! - telemetry events become a [`TelemetrySample`] in the shared state,
//!   everything renders into [`LogLine`]s for the log sink
//!
//! ## Usage Example
//!
//! ```rust
//! use telemlink::types::Frame;
//!
//! let event = telemlink::decoder::decode(&Frame::text("T:-0.01,0.36,6.02,2.00,2.00"));
//! let sample = event.as_telemetry().expect("telemetry line");
//! assert_eq!(sample.roll, Some(-0.01));
//! assert_eq!(sample.custom2, Some(2.0));
//! ```

mod event;
mod frame;
mod key_value;
mod log_line;
mod state;
mod telemetry;
mod update_rate;

pub use event::{BinaryPreview, ClientEvent, DecodedEvent};
pub use frame::{Frame, FrameKind};
pub use key_value::KeyValueSet;
pub use log_line::LogLine;
pub use state::ConnectionState;
pub use telemetry::{FIELD_NAMES, TelemetrySample};
pub use update_rate::UpdateRate;
