//! Fixed-schema telemetry record

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field order of the `T:` wire format
pub const FIELD_NAMES: [&str; 5] = ["roll", "pitch", "yaw", "custom1", "custom2"];

/// One decoded sensor reading.
///
/// Each numeric field is `None` when its CSV position was missing or did not
/// parse; absence is never reported as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub captured_at: DateTime<Utc>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub custom1: Option<f64>,
    pub custom2: Option<f64>,
    pub raw_line: String,
}

impl TelemetrySample {
    /// Build a sample from up to five values in wire order.
    pub fn from_fields(
        captured_at: DateTime<Utc>,
        fields: [Option<f64>; 5],
        raw_line: impl Into<String>,
    ) -> Self {
        let [roll, pitch, yaw, custom1, custom2] = fields;
        Self { captured_at, roll, pitch, yaw, custom1, custom2, raw_line: raw_line.into() }
    }

    /// Values in wire order
    pub fn fields(&self) -> [Option<f64>; 5] {
        [self.roll, self.pitch, self.yaw, self.custom1, self.custom2]
    }

    /// Number of fields that carry a value
    pub fn present_fields(&self) -> usize {
        self.fields().iter().filter(|f| f.is_some()).count()
    }
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.captured_at.format("%H:%M:%S%.3f"))?;
        for (name, value) in FIELD_NAMES.iter().zip(self.fields()) {
            match value {
                Some(v) => write!(f, " {name}={v:.2}")?,
                None => write!(f, " {name}=n/a")?,
            }
        }
        Ok(())
    }
}
