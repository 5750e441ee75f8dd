// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub configuration and link timings.
//!
//! The relay needs exactly two values: the hub base URL and a long-lived
//! access token. Both are loaded once at start from a [`ConfigSource`] and
//! never change afterwards.
//!
//! # Examples
//!
//! ```
//! use ha_notify::config::{Config, ConfigSource};
//!
//! let config = Config::new("https://hass.local:8123", "secret-token").unwrap();
//! assert_eq!(config.websocket_url(), "wss://hass.local:8123/api/websocket");
//!
//! // Loading from an explicit source applies the same validation
//! let source = ConfigSource::explicit("http://10.0.0.2:8123", "");
//! assert!(source.load().is_err());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::supervisor::BackoffPolicy;

/// Environment variable holding the hub base URL.
pub const ENV_HUB_URL: &str = "HA_URL";

/// Environment variable holding the long-lived access token.
pub const ENV_ACCESS_TOKEN: &str = "HA_TOKEN";

/// Path appended to the hub base URL to reach the WebSocket API.
const WEBSOCKET_PATH: &str = "/api/websocket";

/// Validated hub configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    hub_url: String,
    access_token: String,
    websocket_url: String,
}

impl Config {
    /// Creates a configuration from a hub base URL and an access token.
    ///
    /// Surrounding whitespace and a trailing `/` are stripped from the URL.
    ///
    /// # Errors
    ///
    /// Returns error if either value is empty or the URL scheme is not one
    /// of `http`, `https`, `ws` or `wss`.
    pub fn new(
        hub_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let hub_url = hub_url.into().trim().trim_end_matches('/').to_string();
        let access_token = access_token.into().trim().to_string();

        if hub_url.is_empty() {
            return Err(ConfigError::MissingHubUrl);
        }
        if access_token.is_empty() {
            return Err(ConfigError::MissingAccessToken);
        }

        let websocket_url = websocket_url_for(&hub_url)?;

        Ok(Self {
            hub_url,
            access_token,
            websocket_url,
        })
    }

    /// Builds a configuration from a key lookup function.
    ///
    /// The lookup is asked for [`ENV_HUB_URL`] and [`ENV_ACCESS_TOKEN`].
    ///
    /// # Errors
    ///
    /// Returns error if a key is missing or the values are invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hub_url = lookup(ENV_HUB_URL).ok_or(ConfigError::MissingHubUrl)?;
        let access_token = lookup(ENV_ACCESS_TOKEN).ok_or(ConfigError::MissingAccessToken)?;
        Self::new(hub_url, access_token)
    }

    /// Builds a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if `HA_URL` or `HA_TOKEN` is unset or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads a JSON configuration file.
    ///
    /// The file holds `hub_url` and `access_token` (or `ha_url` / `ha_token`).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or a value is
    /// missing.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns error if the document is not valid JSON or a value is missing.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(contents)?;
        let hub_url = file.hub_url.ok_or(ConfigError::MissingHubUrl)?;
        let access_token = file.access_token.ok_or(ConfigError::MissingAccessToken)?;
        Self::new(hub_url, access_token)
    }

    /// Returns the hub base URL as configured.
    #[must_use]
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the WebSocket API endpoint derived from the hub URL.
    #[must_use]
    pub fn websocket_url(&self) -> &str {
        &self.websocket_url
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("hub_url", &self.hub_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// On-disk layout of a configuration file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default, alias = "ha_url")]
    hub_url: Option<String>,
    #[serde(default, alias = "ha_token")]
    access_token: Option<String>,
}

/// Where the relay loads its configuration from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// `HA_URL` and `HA_TOKEN` from the process environment.
    Env,
    /// A JSON file.
    File(PathBuf),
    /// Values supplied by the host; either may be absent.
    Explicit {
        /// Hub base URL.
        hub_url: Option<String>,
        /// Long-lived access token.
        access_token: Option<String>,
    },
}

impl ConfigSource {
    /// Creates an explicit source from two values.
    #[must_use]
    pub fn explicit(hub_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::Explicit {
            hub_url: Some(hub_url.into()),
            access_token: Some(access_token.into()),
        }
    }

    /// Loads and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if a value is missing or invalid, or the file cannot
    /// be read.
    pub fn load(&self) -> Result<Config, ConfigError> {
        match self {
            Self::Env => Config::from_env(),
            Self::File(path) => Config::from_json_file(path),
            Self::Explicit {
                hub_url,
                access_token,
            } => {
                let hub_url = hub_url.clone().ok_or(ConfigError::MissingHubUrl)?;
                let access_token = access_token
                    .clone()
                    .ok_or(ConfigError::MissingAccessToken)?;
                Config::new(hub_url, access_token)
            }
        }
    }
}

/// Maps a hub base URL to its WebSocket API endpoint.
fn websocket_url_for(hub_url: &str) -> Result<String, ConfigError> {
    let (scheme, rest) = hub_url
        .split_once("://")
        .ok_or_else(|| ConfigError::InvalidHubUrl(format!("missing scheme in {hub_url}")))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ConfigError::InvalidHubUrl(format!(
                "unsupported scheme {other}"
            )));
        }
    };

    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::InvalidHubUrl(format!(
            "missing host in {hub_url}"
        )));
    }

    if rest.ends_with(WEBSOCKET_PATH) {
        Ok(format!("{ws_scheme}://{rest}"))
    } else {
        Ok(format!("{ws_scheme}://{rest}{WEBSOCKET_PATH}"))
    }
}

/// Default interval between health monitor wake-ups.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Default silence tolerated before a link is considered dead.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(90);

/// Default interval between keepalive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Default time allowed for the transport to connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for each handshake reply.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing parameters for the connection supervisor.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ha_notify::config::Timings;
///
/// let timings = Timings::default()
///     .with_keepalive_interval(Duration::from_secs(20))
///     .with_stale_threshold(Duration::from_secs(45));
///
/// assert_eq!(timings.monitor_interval, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// How often the health monitor checks the liveness timestamp.
    pub monitor_interval: Duration,
    /// Silence after which the monitor severs the link.
    pub stale_threshold: Duration,
    /// How often a ping is sent on an idle link.
    pub keepalive_interval: Duration,
    /// Maximum time to establish the transport.
    pub connect_timeout: Duration,
    /// Maximum time to wait for each handshake reply.
    pub handshake_timeout: Duration,
    /// Delay before reconnecting, per failure class.
    pub backoff: BackoffPolicy,
}

impl Timings {
    /// Sets the health monitor interval.
    #[must_use]
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Sets the staleness threshold.
    #[must_use]
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    /// Sets the keepalive ping interval.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the handshake reply timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn http_url_maps_to_ws() {
        let config = Config::new("http://192.168.1.20:8123", "token").unwrap();
        assert_eq!(
            config.websocket_url(),
            "ws://192.168.1.20:8123/api/websocket"
        );
    }

    #[test]
    fn https_url_maps_to_wss_and_strips_trailing_slash() {
        let config = Config::new("https://hass.example.com/", "token").unwrap();
        assert_eq!(config.hub_url(), "https://hass.example.com");
        assert_eq!(
            config.websocket_url(),
            "wss://hass.example.com/api/websocket"
        );
    }

    #[test]
    fn websocket_url_is_kept() {
        let config = Config::new("ws://hub:8123/api/websocket", "token").unwrap();
        assert_eq!(config.websocket_url(), "ws://hub:8123/api/websocket");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = Config::new("ftp://hub", "token").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHubUrl(_)));

        let err = Config::new("hub.local:8123", "token").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHubUrl(_)));

        let err = Config::new("http://", "token").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHubUrl(_)));
    }

    #[test]
    fn empty_values_are_missing() {
        assert!(matches!(
            Config::new("  ", "token"),
            Err(ConfigError::MissingHubUrl)
        ));
        assert!(matches!(
            Config::new("http://hub", ""),
            Err(ConfigError::MissingAccessToken)
        ));
    }

    #[test]
    fn lookup_requires_both_keys() {
        let only_url = lookup_from(&[(ENV_HUB_URL, "http://hub:8123")]);
        assert!(matches!(
            Config::from_lookup(only_url),
            Err(ConfigError::MissingAccessToken)
        ));

        let only_token = lookup_from(&[(ENV_ACCESS_TOKEN, "abc")]);
        assert!(matches!(
            Config::from_lookup(only_token),
            Err(ConfigError::MissingHubUrl)
        ));

        let both = lookup_from(&[(ENV_HUB_URL, "http://hub:8123"), (ENV_ACCESS_TOKEN, "abc")]);
        let config = Config::from_lookup(both).unwrap();
        assert_eq!(config.access_token(), "abc");
    }

    #[test]
    fn json_accepts_both_key_styles() {
        let config =
            Config::from_json_str(r#"{"hub_url": "http://hub:8123", "access_token": "t1"}"#)
                .unwrap();
        assert_eq!(config.access_token(), "t1");

        let config =
            Config::from_json_str(r#"{"ha_url": "https://hub", "ha_token": "t2"}"#).unwrap();
        assert_eq!(config.websocket_url(), "wss://hub/api/websocket");
    }

    #[test]
    fn json_missing_token_is_rejected() {
        let err = Config::from_json_str(r#"{"hub_url": "http://hub:8123"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAccessToken));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::from_json_file("/nonexistent/ha_notify.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn explicit_source_without_token_fails() {
        let source = ConfigSource::Explicit {
            hub_url: Some("http://hub".to_string()),
            access_token: None,
        };
        assert!(matches!(
            source.load(),
            Err(ConfigError::MissingAccessToken)
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let config = Config::new("http://hub", "very-secret").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn timings_default_values() {
        let timings = Timings::default();
        assert_eq!(timings.monitor_interval, Duration::from_secs(60));
        assert_eq!(timings.stale_threshold, Duration::from_secs(90));
        assert_eq!(timings.keepalive_interval, Duration::from_secs(30));
        assert!(timings.stale_threshold > timings.monitor_interval);
        assert!(timings.stale_threshold > timings.keepalive_interval);
    }
}
