//! Client configuration.
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! endpoint: ws://192.168.1.88/ws
//! profile: fast
//! backoff:
//!   max_delay_ms: 10000
//! ```
//!
//! [`ClientConfig::validate`] must pass before a client is started; the
//! client constructors call it and fail fast on configuration errors.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backoff::{Backoff, FACTOR, MAX_DELAY_MS, MIN_DELAY_MS};
use crate::log_sink::{DEFAULT_CAPACITY, DEFAULT_VIEW_HEIGHT};
use crate::{Endpoint, LinkError, Result};

/// Endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "ws://192.168.1.88/ws";

/// Capacity of the client event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Connection timing presets for different kinds of peers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectProfile {
    /// Slow embedded peers: 30 s connect timeout, no keep-alive pings
    #[default]
    Embedded,
    /// Fast peers: 15 s connect timeout, ping every 20 s
    Fast,
}

impl ConnectProfile {
    pub fn connect_timeout(self) -> Duration {
        match self {
            ConnectProfile::Embedded => Duration::from_secs(30),
            ConnectProfile::Fast => Duration::from_secs(15),
        }
    }

    pub fn keep_alive(self) -> Option<Duration> {
        match self {
            ConnectProfile::Embedded => None,
            ConnectProfile::Fast => Some(Duration::from_secs(20)),
        }
    }
}

/// Reconnect delay parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { min_delay_ms: MIN_DELAY_MS, max_delay_ms: MAX_DELAY_MS, factor: FACTOR }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> Backoff {
        Backoff::new(self.min_delay_ms, self.max_delay_ms, self.factor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote endpoint URI
    pub endpoint: String,
    /// Accept `http`/`https` hub endpoints
    pub hub: bool,
    pub profile: ConnectProfile,
    /// Overrides the profile's connect timeout
    pub connect_timeout_ms: Option<u64>,
    /// Overrides the profile's keep-alive; `0` disables pings
    pub keep_alive_ms: Option<u64>,
    pub backoff: BackoffConfig,
    /// Maximum stored log lines
    pub log_capacity: usize,
    /// Visible log lines
    pub view_height: usize,
    /// Buffered client events before slow subscribers start skipping
    pub event_capacity: usize,
    /// Log a `Frame -> type=.. length=..` line per message
    pub log_frame_headers: bool,
    /// Log a base64 rendering of binary frames
    pub binary_base64: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            hub: false,
            profile: ConnectProfile::default(),
            connect_timeout_ms: None,
            keep_alive_ms: None,
            backoff: BackoffConfig::default(),
            log_capacity: DEFAULT_CAPACITY,
            view_height: DEFAULT_VIEW_HEIGHT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log_frame_headers: false,
            binary_base64: false,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Self::default() }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| LinkError::Parse {
            context: "client configuration".to_string(),
            details: e.to_string(),
        })
    }

    /// Read and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| LinkError::ConfigFile { path: path.to_path_buf(), source })?;
        let config = Self::from_yaml_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| LinkError::Parse {
            context: "client configuration".to_string(),
            details: e.to_string(),
        })
    }

    pub fn with_profile(mut self, profile: ConnectProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_hub(mut self, hub: bool) -> Self {
        self.hub = hub;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// `None` disables keep-alive pings regardless of profile.
    pub fn with_keep_alive(mut self, interval: Option<Duration>) -> Self {
        self.keep_alive_ms = Some(interval.map_or(0, duration_ms));
        self
    }

    pub fn with_backoff(mut self, min_delay_ms: u64, max_delay_ms: u64, factor: f64) -> Self {
        self.backoff = BackoffConfig { min_delay_ms, max_delay_ms, factor };
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn with_view_height(mut self, view_height: usize) -> Self {
        self.view_height = view_height;
        self
    }

    pub fn with_frame_headers(mut self, enabled: bool) -> Self {
        self.log_frame_headers = enabled;
        self
    }

    pub fn with_binary_base64(mut self, enabled: bool) -> Self {
        self.binary_base64 = enabled;
        self
    }

    /// Parsed endpoint, honouring [`ClientConfig::hub`]
    pub fn endpoint(&self) -> Result<Endpoint> {
        if self.hub { Endpoint::parse_hub(&self.endpoint) } else { Endpoint::parse(&self.endpoint) }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout_ms.map_or_else(|| self.profile.connect_timeout(), Duration::from_millis)
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        match self.keep_alive_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => self.profile.keep_alive(),
        }
    }

    /// Check every setting, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;

        if self.connect_timeout().is_zero() {
            return Err(LinkError::config_invalid("connect_timeout_ms", "must be greater than zero"));
        }

        let backoff = &self.backoff;
        if backoff.min_delay_ms == 0 {
            return Err(LinkError::config_invalid("backoff.min_delay_ms", "must be greater than zero"));
        }
        if backoff.min_delay_ms > backoff.max_delay_ms {
            return Err(LinkError::config_invalid(
                "backoff.max_delay_ms",
                format!(
                    "must be at least min_delay_ms ({} > {})",
                    backoff.min_delay_ms, backoff.max_delay_ms
                ),
            ));
        }
        if !backoff.factor.is_finite() || backoff.factor < 1.0 {
            return Err(LinkError::config_invalid(
                "backoff.factor",
                format!("must be a finite number >= 1.0, got {}", backoff.factor),
            ));
        }

        if self.log_capacity == 0 {
            return Err(LinkError::config_invalid("log_capacity", "must be at least 1"));
        }
        if self.view_height == 0 {
            return Err(LinkError::config_invalid("view_height", "must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(LinkError::config_invalid("event_capacity", "must be at least 1"));
        }

        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();

        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.keep_alive(), None);
        assert_eq!(config.backoff.policy(), Backoff::default());
        assert_eq!(config.log_capacity, 10_000);
        assert_eq!(config.view_height, 4);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let yaml = r#"
endpoint: wss://robot.local/ws
profile: fast
backoff:
  max_delay_ms: 10000
"#;
        let config = ClientConfig::from_yaml_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.endpoint, "wss://robot.local/ws");
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.keep_alive(), Some(Duration::from_secs(20)));
        assert_eq!(config.backoff.min_delay_ms, 500);
        assert_eq!(config.backoff.max_delay_ms, 10_000);
        assert_eq!(config.backoff.factor, 2.0);
    }

    #[test]
    fn yaml_roundtrip() {
        let config = ClientConfig::new("ws://10.0.0.2:81/").with_profile(ConnectProfile::Fast);
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(ClientConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn overrides_beat_profile() {
        let config = ClientConfig::default()
            .with_profile(ConnectProfile::Fast)
            .with_connect_timeout(Duration::from_secs(5))
            .with_keep_alive(None);

        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.keep_alive(), None);
    }

    #[test]
    fn invalid_scheme_is_fatal() {
        let err = ClientConfig::new("http://192.168.1.88/hub").validate().unwrap_err();
        assert!(matches!(err, LinkError::InvalidEndpoint { .. }));
        assert!(!err.is_retryable());

        ClientConfig::new("http://192.168.1.88/hub").with_hub(true).validate().unwrap();
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let cases = [
            ClientConfig::default().with_backoff(0, 1000, 2.0),
            ClientConfig::default().with_backoff(2000, 1000, 2.0),
            ClientConfig::default().with_backoff(500, 1000, 0.5),
            ClientConfig::default().with_backoff(500, 1000, f64::NAN),
            ClientConfig::default().with_log_capacity(0),
            ClientConfig::default().with_view_height(0),
            ClientConfig::default().with_connect_timeout(Duration::ZERO),
        ];
        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, LinkError::Config { .. }), "unexpected {err:?}");
        }
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = ClientConfig::from_yaml_str("backoff: [1, 2").unwrap_err();
        assert!(matches!(err, LinkError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::load("/definitely/not/here.yaml").unwrap_err();
        match err {
            LinkError::ConfigFile { path, .. } => assert!(path.ends_with("here.yaml")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
