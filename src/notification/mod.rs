// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notifications relayed from the hub.
//!
//! A [`Notification`] is created when a subscribed event frame arrives and
//! waits in the [`NotificationBuffer`] until the host drains it.
//!
//! # Examples
//!
//! ```
//! use ha_notify::notification::NotificationBuffer;
//!
//! let buffer = NotificationBuffer::new();
//! buffer.record(Some("Door"), Some("Front door opened"), 1_700_000_000.0, None);
//!
//! let drained = buffer.drain_all();
//! assert_eq!(drained.len(), 1);
//! assert_eq!(drained[0].title(), "Door");
//! assert!(buffer.is_empty());
//! ```

mod buffer;

pub use buffer::{DEFAULT_BUFFER_CAPACITY, NotificationBuffer};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when an event does not carry one.
pub const DEFAULT_TITLE: &str = "Notification";

/// A single notification waiting to be shown by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    id: Uuid,
    title: String,
    message: String,
    timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
}

impl Notification {
    /// Creates a notification, defaulting a missing title or message.
    #[must_use]
    pub fn new(
        title: Option<&str>,
        message: Option<&str>,
        timestamp: f64,
        action: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.unwrap_or(DEFAULT_TITLE).to_string(),
            message: message.unwrap_or_default().to_string(),
            timestamp,
            action: action.map(str::to_string),
        }
    }

    /// Returns the unique notification ID.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the message body.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the receipt time in seconds since the Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Returns the URL or deep link supplied by the event, if any.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
#[must_use]
pub fn now_timestamp() -> f64 {
    // Millisecond precision is plenty for display purposes
    #[allow(clippy::cast_precision_loss)]
    let millis = chrono::Utc::now().timestamp_millis() as f64;
    millis / 1000.0
}
