// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point-in-time statistics for the host.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::{LinkState, RelayContext, ServiceStatus};

/// Snapshot of the relay's state.
///
/// Serializes with the keys the host UI reads:
///
/// ```json
/// {
///   "status": "running",
///   "pending_notifications": 2,
///   "websocket_status": "subscribed",
///   "ha_url": "http://homeassistant.local:8123",
///   "last_error": null,
///   "dropped_notifications": 0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Lifecycle status of the relay.
    pub status: ServiceStatus,
    /// Notifications waiting to be drained.
    #[serde(rename = "pending_notifications")]
    pub pending_count: usize,
    /// Current link state.
    #[serde(rename = "websocket_status")]
    pub link_state: LinkState,
    /// Configured hub URL; absent until configuration succeeded.
    #[serde(rename = "ha_url")]
    pub hub_url: Option<String>,
    /// Most recent failure, cleared once a session is subscribed.
    pub last_error: Option<String>,
    /// Notifications evicted because the buffer was full.
    #[serde(rename = "dropped_notifications")]
    pub dropped: u64,
}

/// Reads [`Stats`] out of a shared [`RelayContext`].
#[derive(Debug, Clone)]
pub struct StatusReporter {
    context: Arc<RelayContext>,
}

impl StatusReporter {
    /// Creates a reporter over `context`.
    #[must_use]
    pub fn new(context: Arc<RelayContext>) -> Self {
        Self { context }
    }

    /// Takes a snapshot. Never blocks on I/O and never fails.
    #[must_use]
    pub fn snapshot(&self) -> Stats {
        let notifications = self.context.notifications();
        Stats {
            status: self.context.service_status(),
            pending_count: notifications.len(),
            link_state: self.context.link_state(),
            hub_url: self.context.hub_url(),
            last_error: self.context.last_error(),
            dropped: notifications.dropped(),
        }
    }
}
