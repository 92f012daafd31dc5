//! Validated remote endpoint.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::{LinkError, Result};

/// Absolute URI of the device or server the client talks to.
///
/// Raw socket endpoints must use `ws` or `wss`. Hub endpoints additionally
/// accept `http` and `https`; the socket is then opened on the equivalent
/// `ws`/`wss` URL with the same host, port, path and query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    hub: bool,
}

impl Endpoint {
    /// Parse a raw socket endpoint (`ws://` or `wss://`).
    pub fn parse(uri: &str) -> Result<Self> {
        Self::parse_inner(uri, false)
    }

    /// Parse a hub endpoint (`http`, `https`, `ws` or `wss`).
    pub fn parse_hub(uri: &str) -> Result<Self> {
        Self::parse_inner(uri, true)
    }

    fn parse_inner(uri: &str, hub: bool) -> Result<Self> {
        let url = Url::parse(uri.trim())
            .map_err(|e| LinkError::invalid_endpoint(uri, format!("not an absolute URI ({e})")))?;

        let allowed = match url.scheme() {
            "ws" | "wss" => true,
            "http" | "https" => hub,
            _ => false,
        };
        if !allowed {
            let expected = if hub { "ws, wss, http or https" } else { "ws or wss" };
            return Err(LinkError::invalid_endpoint(
                uri,
                format!("unsupported scheme '{}' (expected {expected})", url.scheme()),
            ));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(LinkError::invalid_endpoint(uri, "missing host"));
        }

        Ok(Self { url, hub })
    }

    /// The URI as given (after normalisation by the URL parser).
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn is_hub(&self) -> bool {
        self.hub
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.url.scheme(), "wss" | "https")
    }

    /// URL the socket is actually opened on.
    pub fn websocket_url(&self) -> Url {
        let mut url = self.url.clone();
        let scheme = match url.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            // special-to-special scheme swap, cannot fail
            let _ = url.set_scheme(scheme);
        }
        url
    }
}

impl FromStr for Endpoint {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_websocket_schemes() {
        let plain = Endpoint::parse("ws://192.168.1.88/ws").unwrap();
        assert_eq!(plain.as_str(), "ws://192.168.1.88/ws");
        assert!(!plain.is_secure());
        assert!(!plain.is_hub());

        let secure: Endpoint = "wss://robot.local:8443/telemetry".parse().unwrap();
        assert!(secure.is_secure());
        assert_eq!(secure.websocket_url().as_str(), "wss://robot.local:8443/telemetry");
    }

    #[test]
    fn rejects_http_for_raw_sockets() {
        let err = Endpoint::parse("http://192.168.1.88/hub").unwrap_err();
        assert!(matches!(err, LinkError::InvalidEndpoint { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn rejects_relative_and_foreign_schemes() {
        assert!(Endpoint::parse("/ws").is_err());
        assert!(Endpoint::parse("not a uri").is_err());
        assert!(Endpoint::parse("ftp://host/file").is_err());
        assert!(Endpoint::parse_hub("mqtt://broker:1883").is_err());
    }

    #[test]
    fn hub_endpoints_map_to_websocket_urls() {
        let hub = Endpoint::parse_hub("http://10.0.0.5:5000/telemetryHub?id=7").unwrap();
        assert!(hub.is_hub());
        assert_eq!(hub.websocket_url().as_str(), "ws://10.0.0.5:5000/telemetryHub?id=7");

        let secure = Endpoint::parse_hub("https://example.com/hub").unwrap();
        assert!(secure.is_secure());
        assert_eq!(secure.websocket_url().scheme(), "wss");

        let already_ws = Endpoint::parse_hub("ws://example.com/hub").unwrap();
        assert_eq!(already_ws.websocket_url().as_str(), "ws://example.com/hub");
    }
}
