//! Connection loop tests against scripted transports
//!
//! These run on paused tokio time, so backoff and timeout waits complete
//! instantly while keeping their order.

use super::*;
use crate::transport::{CloseInfo, Incoming, Link};
use crate::transports::{ReplayConnector, ScriptStep};
use futures::StreamExt;
use std::pin::Pin;
use std::time::Duration;

type Lines = Pin<Box<dyn Stream<Item = LogLine> + Send>>;

fn config() -> ClientConfig {
    ClientConfig::new("ws://device.test/ws")
}

fn start(connector: ReplayConnector) -> (TelemetryClient, Lines) {
    let client = TelemetryClient::spawn_with(config(), connector).unwrap();
    let lines: Lines = Box::pin(client.log_lines());
    (client, lines)
}

/// Read log lines until `n` reconnect delays have been announced.
async fn reconnect_delays(lines: &mut Lines, n: usize) -> Vec<u64> {
    let mut delays = Vec::new();
    while delays.len() < n {
        let line = lines.next().await.expect("log stream ended");
        if let Some(ms) = line.text.strip_prefix("Reconnecting in ").and_then(|r| r.strip_suffix("ms...")) {
            delays.push(ms.parse().unwrap());
        }
    }
    delays
}

async fn wait_for_line(lines: &mut Lines, text: &str) {
    while let Some(line) = lines.next().await {
        if line.text == text {
            return;
        }
    }
    panic!("log stream ended before {text:?}");
}

#[tokio::test(start_paused = true)]
async fn refused_connects_back_off_to_the_cap() {
    let (client, mut lines) = start(ReplayConnector::new());

    let delays = reconnect_delays(&mut lines, 9).await;
    assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn healthy_session_resets_backoff() {
    let connector = ReplayConnector::new()
        .refuse("booting")
        .refuse("booting")
        .session([ScriptStep::text("hello"), ScriptStep::close(1000, "bye")]);
    let (client, mut lines) = start(connector);

    let delays = reconnect_delays(&mut lines, 4).await;
    assert_eq!(delays, vec![500, 1000, 500, 1000]);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn clean_close_without_data_is_healthy() {
    let connector = ReplayConnector::new()
        .refuse("booting")
        .refuse("booting")
        .refuse("booting")
        .session([ScriptStep::close(1001, "going away")]);
    let (client, mut lines) = start(connector);

    let delays = reconnect_delays(&mut lines, 5).await;
    assert_eq!(delays, vec![500, 1000, 2000, 500, 1000]);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failure_after_data_still_resets() {
    let connector = ReplayConnector::new()
        .refuse("booting")
        .refuse("booting")
        .session([ScriptStep::text("T:1,2,3"), ScriptStep::Fail("reset by peer".into())]);
    let (client, mut lines) = start(connector);

    let delays = reconnect_delays(&mut lines, 3).await;
    assert_eq!(delays, vec![500, 1000, 500]);

    let logged: Vec<_> = client.log_sink().all().into_iter().map(|l| l.text).collect();
    assert!(logged.contains(&"Transport error: reset by peer".to_string()), "{logged:?}");

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn empty_frames_do_not_count_as_data() {
    let connector = ReplayConnector::new()
        .refuse("booting")
        .session([ScriptStep::text(""), ScriptStep::Fail("reset".into())]);
    let (client, mut lines) = start(connector);

    let delays = reconnect_delays(&mut lines, 3).await;
    assert_eq!(delays, vec![500, 1000, 2000]);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn telemetry_reaches_state_and_observers() {
    let connector = ReplayConnector::new().session([
        ScriptStep::text("hello world"),
        ScriptStep::text("T:-0.01,0.36,6.02,2.00,2.00"),
        ScriptStep::Hold,
    ]);
    let client = TelemetryClient::spawn_with(config(), connector).unwrap();
    let mut samples = client.telemetry(UpdateRate::Native);

    let sample = samples.next().await.unwrap();
    assert_eq!(sample.roll, Some(-0.01));
    assert_eq!(sample.yaw, Some(6.02));
    assert_eq!(client.latest(), Some(sample));
    assert_eq!(client.state(), ConnectionState::Open);

    let logged: Vec<_> = client.log_sink().all().into_iter().map(|l| l.text).collect();
    assert_eq!(
        logged,
        vec![
            "[WS] Connecting to ws://device.test/ws...",
            "Connected. Receiving frames until shutdown or remote close...",
            "hello world",
            "T:-0.01,0.36,6.02,2.00,2.00",
        ]
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn remote_close_is_logged_and_acknowledged() {
    let connector = ReplayConnector::new().session([ScriptStep::close(1000, "bye")]);
    let stats = connector.stats();
    let (client, mut lines) = start(connector);

    wait_for_line(&mut lines, "Server sent close: 1000 - bye").await;
    reconnect_delays(&mut lines, 1).await;

    assert_eq!(stats.close_acks(), 1);
    // the link reported closed, so no client-side close was attempted
    assert_eq!(stats.client_closes(), 0);

    client.shutdown().await;
}

/// Peer that closes once and then never reads the acknowledgement
struct DeafPeer {
    sessions: usize,
}

struct DeafLink {
    closed: bool,
}

#[async_trait::async_trait]
impl Connector for DeafPeer {
    async fn connect(&mut self, _endpoint: &Endpoint) -> Result<Box<dyn Link>> {
        self.sessions += 1;
        if self.sessions > 1 {
            return Err(crate::LinkError::connect_failed("gone"));
        }
        Ok(Box::new(DeafLink { closed: false }))
    }
}

#[async_trait::async_trait]
impl Link for DeafLink {
    async fn next_message(&mut self) -> Result<Option<Incoming>> {
        if self.closed {
            std::future::pending::<()>().await;
        }
        self.closed = true;
        Ok(Some(Incoming::Close(Some(CloseInfo::normal("bye")))))
    }

    async fn acknowledge_close(&mut self) -> Result<()> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<()> {
        std::future::pending().await
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_unanswered_close_ack() {
    let client = TelemetryClient::spawn_with(config(), DeafPeer { sessions: 0 }).unwrap();
    let logs = Arc::clone(client.log_sink());
    let mut lines: Lines = Box::pin(client.log_lines());

    wait_for_line(&mut lines, "Server sent close: 1000 - bye").await;

    let stopped = tokio::time::timeout(Duration::from_secs(1), client.shutdown()).await;
    assert!(stopped.is_ok(), "shutdown hung on the close acknowledgement");
    assert_eq!(logs.all().pop().unwrap().text, "Listener stopped.");
}

#[tokio::test(start_paused = true)]
async fn unanswered_close_ack_times_out() {
    let client = TelemetryClient::spawn_with(config(), DeafPeer { sessions: 0 }).unwrap();
    let mut lines: Lines = Box::pin(client.log_lines());

    wait_for_line(&mut lines, "Server sent close: 1000 - bye").await;
    let started = tokio::time::Instant::now();

    // the remote close still counts as a healthy session
    assert_eq!(reconnect_delays(&mut lines, 1).await, vec![500]);
    assert!(started.elapsed() >= Duration::from_secs(2));

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stalled_connect_times_out() {
    let connector = ReplayConnector::new().stall();
    let stats = connector.stats();
    let config = config().with_connect_timeout(Duration::from_secs(5));
    let client = TelemetryClient::spawn_with(config, connector).unwrap();
    let mut lines: Lines = Box::pin(client.log_lines());

    let started = tokio::time::Instant::now();
    wait_for_line(&mut lines, "Connect attempt timed out after 5s").await;
    assert!(started.elapsed() >= Duration::from_secs(5));

    assert_eq!(reconnect_delays(&mut lines, 1).await, vec![500]);
    assert_eq!(stats.attempts(), 1);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_open_link_and_stops() {
    let connector = ReplayConnector::new().session([ScriptStep::Hold]);
    let stats = connector.stats();
    let client = TelemetryClient::spawn_with(config(), connector).unwrap();
    let logs = Arc::clone(client.log_sink());

    let mut states = Box::pin(client.state_changes());
    while states.next().await != Some(ConnectionState::Open) {}

    client.shutdown().await;

    assert_eq!(stats.client_closes(), 1);
    let last = logs.all().pop().unwrap();
    assert_eq!(last.text, "Listener stopped.");
    assert!(!logs.all().iter().any(|l| l.text.starts_with("Reconnecting")));
}

#[tokio::test(start_paused = true)]
async fn stop_is_observable_through_state() {
    let client = TelemetryClient::spawn_with(config(), ReplayConnector::new()).unwrap();
    let mut states = Box::pin(client.state_changes());

    client.stop();
    while let Some(state) = states.next().await {
        if state.is_terminal() {
            break;
        }
    }
    assert!(client.is_stopped());
    assert_eq!(client.log_view().lines.last().unwrap().text, "Listener stopped.");
}

#[tokio::test(start_paused = true)]
async fn throttled_observer_gets_latest() {
    let connector = ReplayConnector::new().session([
        ScriptStep::text("T:1,0,0"),
        ScriptStep::text("T:2,0,0"),
        ScriptStep::text("T:3,0,0"),
        ScriptStep::wait_ms(1000),
        ScriptStep::text("T:4,0,0"),
        ScriptStep::Hold,
    ]);
    let client = TelemetryClient::spawn_with(config(), connector).unwrap();
    let mut samples = client.telemetry(UpdateRate::Max(2));

    let first = samples.next().await.unwrap();
    assert_eq!(first.roll, Some(3.0));

    let second = samples.next().await.unwrap();
    assert_eq!(second.roll, Some(4.0));

    client.shutdown().await;
}

#[tokio::test]
async fn invalid_endpoint_is_rejected_up_front() {
    let err = TelemetryClient::spawn_with(ClientConfig::new("ftp://device/ws"), ReplayConnector::new())
        .err()
        .unwrap();
    assert!(!err.is_retryable());
}
