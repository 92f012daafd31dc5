//! Delivery rate for observer streams

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often an observer wants telemetry samples delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every published sample, as fast as the device sends them
    Native,

    /// At most this many samples per second, latest wins.
    /// `Max(0)` is treated as `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Minimum spacing between delivered samples, if any
    pub fn interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}
