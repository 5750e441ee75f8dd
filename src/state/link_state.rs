// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection and service state enums.

use serde::{Deserialize, Serialize};

/// State of the link to the hub.
///
/// Only the connection supervisor changes it. Exactly one value is current
/// at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No transport is open.
    #[default]
    Disconnected,
    /// The transport is being established.
    Connecting,
    /// The hub greeted us and authentication is in progress.
    AuthPending,
    /// Authenticated and subscribed; events are flowing.
    Subscribed,
    /// The session is being torn down.
    Closing,
    /// The supervisor was cancelled and will not reconnect.
    Cancelled,
}

impl LinkState {
    /// Returns true if events can currently be received.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Subscribed)
    }

    /// Returns true if the supervisor has stopped for good.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the lowercase name used in status reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AuthPending => "auth_pending",
            Self::Subscribed => "subscribed",
            Self::Closing => "closing",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of the relay as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Not started yet.
    #[default]
    Idle,
    /// The supervisor task is running.
    Running,
    /// Stopped by the host.
    Stopped,
    /// Configuration was missing or invalid; nothing runs.
    Unavailable,
}

impl ServiceStatus {
    /// Returns the lowercase name used in status reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_idle_and_disconnected() {
        assert_eq!(LinkState::default(), LinkState::Disconnected);
        assert_eq!(ServiceStatus::default(), ServiceStatus::Idle);
    }

    #[test]
    fn only_subscribed_is_connected() {
        assert!(LinkState::Subscribed.is_connected());
        assert!(!LinkState::AuthPending.is_connected());
        assert!(!LinkState::Closing.is_connected());
    }

    #[test]
    fn serde_names_match_display() {
        for state in [
            LinkState::Disconnected,
            LinkState::Connecting,
            LinkState::AuthPending,
            LinkState::Subscribed,
            LinkState::Closing,
            LinkState::Cancelled,
        ] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, state.as_str());
        }
        assert_eq!(
            serde_json::to_value(ServiceStatus::Unavailable).unwrap(),
            "unavailable"
        );
    }
}
