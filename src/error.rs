// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `ha_notify` library.
//!
//! This module provides the error hierarchy for the relay: configuration
//! loading, transport communication, wire decoding, the authentication
//! handshake, and the per-session failures the supervisor classifies into
//! retry decisions.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::supervisor::FailureKind;

/// The main error type for this library.
///
/// Only configuration problems and lifecycle misuse ever reach the host.
/// Everything that happens inside a connection attempt is absorbed by the
/// supervisor and turned into a retry.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The relay was started while a supervisor is still running.
    #[error("relay is already running")]
    AlreadyRunning,
}

/// Errors raised while loading the hub configuration.
///
/// All of these are fatal: the supervisor is never started.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The hub base URL was not provided.
    #[error("hub URL is not set (HA_URL)")]
    MissingHubUrl,

    /// The long-lived access token was not provided.
    #[error("access token is not set (HA_TOKEN)")]
    MissingAccessToken,

    /// The hub URL uses an unsupported scheme or is malformed.
    #[error("invalid hub URL: {0}")]
    InvalidHubUrl(String),

    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors related to the WebSocket transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The WebSocket layer reported an error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    /// Connection to the hub failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The hub closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ProtocolError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            other => Self::WebSocket(Box::new(other)),
        }
    }
}

/// Errors related to decoding hub messages.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the message.
    #[error("missing field in message: {0}")]
    MissingField(String),

    /// Unexpected message format.
    #[error("unexpected message format: {0}")]
    UnexpectedFormat(String),
}

/// Errors reported by the session handshake.
///
/// The handshake never retries on its own; the supervisor decides what to
/// do with each variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The hub answered the auth message with anything but `auth_ok`.
    #[error("authentication rejected: {0}")]
    Rejected(String),

    /// Greeting missing or malformed, unexpected message, or the link dropped.
    #[error("handshake failed: {0}")]
    Failed(String),

    /// No reply arrived within the handshake timeout.
    #[error("no handshake reply within {0} ms")]
    Timeout(u64),
}

/// Reason a single connection attempt or session ended.
///
/// Produced at the supervisor boundary; each variant maps to one
/// [`FailureKind`] and therefore one backoff delay.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connecting, reading or writing the transport failed.
    #[error("transport failure: {0}")]
    Transport(#[from] ProtocolError),

    /// The handshake failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The link went away: close frame, end of stream or stale link.
    #[error("link lost: {0}")]
    LinkLost(String),
}

impl SessionError {
    /// Classifies the failure for the backoff table.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Handshake(HandshakeError::Timeout(_)) => FailureKind::Timeout,
            Self::Handshake(HandshakeError::Rejected(_)) => FailureKind::Authentication,
            Self::Transport(ProtocolError::ConnectionClosed)
            | Self::Handshake(HandshakeError::Failed(_))
            | Self::LinkLost(_) => FailureKind::Other,
            Self::Transport(_) => FailureKind::Transport,
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Converts a duration to whole milliseconds, saturating.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        assert_eq!(
            ConfigError::MissingAccessToken.to_string(),
            "access token is not set (HA_TOKEN)"
        );
    }

    #[test]
    fn error_from_config_error() {
        let err: Error = ConfigError::MissingHubUrl.into();
        assert!(matches!(err, Error::Config(ConfigError::MissingHubUrl)));
    }

    #[test]
    fn handshake_error_display() {
        let err = HandshakeError::Rejected("auth_invalid".to_string());
        assert_eq!(err.to_string(), "authentication rejected: auth_invalid");
    }

    #[test]
    fn duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_secs(2)), 2000);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn session_error_classification() {
        let refused = SessionError::Transport(ProtocolError::ConnectionFailed("refused".into()));
        assert_eq!(refused.kind(), FailureKind::Transport);

        let stalled = SessionError::Transport(ProtocolError::ConnectionFailed(
            "connect timed out after 10000 ms".into(),
        ));
        assert_eq!(stalled.kind(), FailureKind::Transport);

        let rejected = SessionError::Handshake(HandshakeError::Rejected("auth_invalid".into()));
        assert_eq!(rejected.kind(), FailureKind::Authentication);

        let slow = SessionError::Handshake(HandshakeError::Timeout(10_000));
        assert_eq!(slow.kind(), FailureKind::Timeout);

        let malformed = SessionError::Handshake(HandshakeError::Failed("no greeting".into()));
        assert_eq!(malformed.kind(), FailureKind::Other);

        let stale = SessionError::LinkLost("stale".into());
        assert_eq!(stale.kind(), FailureKind::Other);

        let closed = SessionError::Transport(ProtocolError::ConnectionClosed);
        assert_eq!(closed.kind(), FailureKind::Other);
    }

    #[test]
    fn closed_socket_maps_to_connection_closed() {
        use tokio_tungstenite::tungstenite::Error as WsError;

        assert!(matches!(
            ProtocolError::from(WsError::ConnectionClosed),
            ProtocolError::ConnectionClosed
        ));
        assert!(matches!(
            ProtocolError::from(WsError::AlreadyClosed),
            ProtocolError::ConnectionClosed
        ));
        assert!(matches!(
            ProtocolError::from(WsError::Utf8),
            ProtocolError::WebSocket(_)
        ));
    }
}
