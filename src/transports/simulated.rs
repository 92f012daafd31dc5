//! Synthetic telemetry source for demos and UI work without hardware.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::transport::{CloseInfo, Connector, Incoming, Link};
use crate::types::Frame;
use crate::{Endpoint, LinkError, Result};

/// Generates `T:` telemetry lines plus a periodic `status=... sensor=...`
/// key/value line, ticking on the tokio clock.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    interval: Duration,
    session_length: Option<u64>,
    status_every: u64,
    refuse_first: u32,
    attempts: u32,
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            session_length: None,
            status_every: 10,
            refuse_first: 0,
            attempts: 0,
        }
    }
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time between generated messages; zero is raised to 1 ms.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Close each session normally after `messages` messages.
    pub fn with_session_length(mut self, messages: u64) -> Self {
        self.session_length = Some(messages);
        self
    }

    /// Emit a status line every `n`th message; `0` disables them.
    pub fn with_status_every(mut self, n: u64) -> Self {
        self.status_every = n;
        self
    }

    /// Reject the first `n` connect attempts, like a device still booting.
    pub fn refusing_first(mut self, n: u32) -> Self {
        self.refuse_first = n;
        self
    }
}

#[async_trait::async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Link>> {
        self.attempts += 1;
        if self.attempts <= self.refuse_first {
            return Err(LinkError::connect_failed(format!(
                "simulated device at {endpoint} not ready (attempt {})",
                self.attempts
            )));
        }

        debug!(attempt = self.attempts, "Simulated session opened");
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Box::new(SimulatedLink {
            ticker,
            step: self.interval.as_secs_f64(),
            sent: 0,
            session_length: self.session_length,
            status_every: self.status_every,
            open: true,
        }))
    }
}

struct SimulatedLink {
    ticker: Interval,
    step: f64,
    sent: u64,
    session_length: Option<u64>,
    status_every: u64,
    open: bool,
}

impl SimulatedLink {
    fn message(&self) -> String {
        let n = self.sent;
        if self.status_every > 0 && n % self.status_every == 0 {
            let uptime_ms = (n as f64 * self.step * 1000.0).round() as u64;
            return format!("status=OK sensor=IMU seq={n} uptime_ms={uptime_ms}");
        }
        telemetry_line(n as f64 * self.step)
    }
}

/// Smooth attitude curves: a slow roll sway, a pitch bob and a steady yaw drift.
fn telemetry_line(t: f64) -> String {
    let roll = 12.0 * (t * 0.9).sin();
    let pitch = 4.0 * (t * 1.7).sin() + 1.5;
    let yaw = (t * 18.0).rem_euclid(360.0);
    let throttle = 50.0 + 50.0 * (t * 0.3).sin();
    let battery = 12.6 - (t * 0.001).min(2.0);
    format!("T:{roll:.2},{pitch:.2},{yaw:.2},{throttle:.1},{battery:.2}")
}

#[async_trait::async_trait]
impl Link for SimulatedLink {
    async fn next_message(&mut self) -> Result<Option<Incoming>> {
        if !self.open {
            return Ok(None);
        }
        if self.session_length.is_some_and(|limit| self.sent >= limit) {
            self.open = false;
            return Ok(Some(Incoming::Close(Some(CloseInfo::normal("simulation complete")))));
        }

        self.ticker.tick().await;
        self.sent += 1;
        Ok(Some(Incoming::Frame(Frame::text(self.message()))))
    }

    async fn acknowledge_close(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder;
    use crate::types::DecodedEvent;

    fn endpoint() -> Endpoint {
        Endpoint::parse("ws://sim.local/ws").unwrap()
    }

    #[test]
    fn generated_lines_decode_as_telemetry() {
        for i in 0..50 {
            let line = telemetry_line(i as f64 * 0.1);
            let event = decoder::decode(&Frame::text(line.clone()));
            let sample = event.as_telemetry().unwrap_or_else(|| panic!("not telemetry: {line}"));
            assert_eq!(sample.present_fields(), 5);
            assert!((0.0..360.0).contains(&sample.yaw.unwrap()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn status_lines_are_interleaved() {
        let mut connector = SimulatedConnector::new().with_status_every(3).with_session_length(6);
        let mut link = connector.connect(&endpoint()).await.unwrap();

        let mut kinds = Vec::new();
        while let Some(incoming) = link.next_message().await.unwrap() {
            match incoming {
                Incoming::Frame(frame) => match decoder::decode(&frame) {
                    DecodedEvent::Telemetry(_) => kinds.push('T'),
                    DecodedEvent::KeyValues { pairs, .. } => {
                        assert_eq!(pairs.get("sensor"), Some("IMU"));
                        kinds.push('K');
                    }
                    other => panic!("unexpected {other:?}"),
                },
                Incoming::Close(info) => {
                    assert_eq!(info.unwrap().reason, "simulation complete");
                    break;
                }
            }
        }

        assert_eq!(kinds.iter().collect::<String>(), "TTKTTK");
        assert!(!link.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn refuses_while_booting() {
        let mut connector = SimulatedConnector::new().refusing_first(2);
        assert!(connector.connect(&endpoint()).await.is_err());
        assert!(connector.connect(&endpoint()).await.is_err());
        assert!(connector.connect(&endpoint()).await.is_ok());
    }
}
