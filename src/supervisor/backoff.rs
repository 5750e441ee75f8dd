// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Failure classes and the fixed backoff table.
//!
//! The supervisor retries forever. Each failure class has its own fixed
//! delay: no exponential growth, no jitter, no retry cap.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay after a connector or transport failure.
pub const TRANSPORT_BACKOFF: Duration = Duration::from_secs(10);

/// Delay after the hub rejected the access token.
pub const AUTH_BACKOFF: Duration = Duration::from_secs(10);

/// Delay after the hub did not answer a handshake message in time.
pub const TIMEOUT_BACKOFF: Duration = Duration::from_secs(5);

/// Delay after any other failure, including a closed or stale link.
pub const OTHER_BACKOFF: Duration = Duration::from_secs(10);

/// Classification of a failed connection attempt or session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// DNS, refused or stalled connect, TLS or socket failure.
    Transport,
    /// The hub answered the auth message with anything but `auth_ok`.
    Authentication,
    /// A handshake reply took too long.
    Timeout,
    /// Anything else: malformed greeting, close frame, end of stream or a
    /// stale link.
    Other,
}

impl FailureKind {
    /// Returns a short name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Authentication => "authentication",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed delay before reconnecting, per failure class.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ha_notify::supervisor::{BackoffPolicy, FailureKind};
///
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.delay_for(FailureKind::Timeout), Duration::from_secs(5));
///
/// // Every class at once, e.g. for tests
/// let fast = BackoffPolicy::uniform(Duration::from_millis(50));
/// assert_eq!(fast.delay_for(FailureKind::Authentication), Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after [`FailureKind::Transport`].
    pub transport: Duration,
    /// Delay after [`FailureKind::Authentication`].
    pub authentication: Duration,
    /// Delay after [`FailureKind::Timeout`].
    pub timeout: Duration,
    /// Delay after [`FailureKind::Other`].
    pub other: Duration,
}

impl BackoffPolicy {
    /// Uses the same delay for every failure class.
    #[must_use]
    pub fn uniform(delay: Duration) -> Self {
        Self {
            transport: delay,
            authentication: delay,
            timeout: delay,
            other: delay,
        }
    }

    /// Returns the delay before the next attempt.
    #[must_use]
    pub fn delay_for(&self, kind: FailureKind) -> Duration {
        match kind {
            FailureKind::Transport => self.transport,
            FailureKind::Authentication => self.authentication,
            FailureKind::Timeout => self.timeout,
            FailureKind::Other => self.other,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            transport: TRANSPORT_BACKOFF,
            authentication: AUTH_BACKOFF,
            timeout: TIMEOUT_BACKOFF,
            other: OTHER_BACKOFF,
        }
    }
}
