// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared state of one relay instance.

use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::notification::NotificationBuffer;

use super::{LinkState, ServiceStatus};

/// State shared by the supervisor, the health monitor and the host.
///
/// Each field has a single writer:
///
/// - link state, liveness and last error: the supervisor task
/// - notifications: the receive loop (the host only drains)
/// - service status and hub URL: the [`Relay`](crate::Relay) lifecycle hooks
///
/// The health monitor and the status reporter only read.
#[derive(Debug)]
pub struct RelayContext {
    link_state: RwLock<LinkState>,
    service_status: RwLock<ServiceStatus>,
    hub_url: RwLock<Option<String>>,
    last_error: RwLock<Option<String>>,
    last_seen: Mutex<Instant>,
    notifications: NotificationBuffer,
}

impl RelayContext {
    /// Creates a context around the given notification buffer.
    #[must_use]
    pub fn new(notifications: NotificationBuffer) -> Self {
        Self {
            link_state: RwLock::new(LinkState::Disconnected),
            service_status: RwLock::new(ServiceStatus::Idle),
            hub_url: RwLock::new(None),
            last_error: RwLock::new(None),
            last_seen: Mutex::new(Instant::now()),
            notifications,
        }
    }

    /// Returns the current link state.
    #[must_use]
    pub fn link_state(&self) -> LinkState {
        *self.link_state.read()
    }

    /// Updates the link state, logging the transition.
    pub(crate) fn set_link_state(&self, state: LinkState) {
        let previous = std::mem::replace(&mut *self.link_state.write(), state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Link state changed");
        }
    }

    /// Returns the relay's lifecycle status.
    #[must_use]
    pub fn service_status(&self) -> ServiceStatus {
        *self.service_status.read()
    }

    pub(crate) fn set_service_status(&self, status: ServiceStatus) {
        *self.service_status.write() = status;
    }

    /// Returns the configured hub URL, if configuration succeeded.
    #[must_use]
    pub fn hub_url(&self) -> Option<String> {
        self.hub_url.read().clone()
    }

    pub(crate) fn set_hub_url(&self, url: Option<String>) {
        *self.hub_url.write() = url;
    }

    /// Returns the description of the most recent failure.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub(crate) fn set_last_error(&self, error: Option<String>) {
        *self.last_error.write() = error;
    }

    /// Records that a frame was just received.
    pub(crate) fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Returns the time elapsed since the last received frame.
    #[must_use]
    pub fn since_last_seen(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Returns the notification buffer.
    #[must_use]
    pub fn notifications(&self) -> &NotificationBuffer {
        &self.notifications
    }
}

impl Default for RelayContext {
    fn default() -> Self {
        Self::new(NotificationBuffer::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_idle_and_disconnected() {
        let ctx = RelayContext::default();
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
        assert_eq!(ctx.service_status(), ServiceStatus::Idle);
        assert!(ctx.hub_url().is_none());
        assert!(ctx.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn touch_resets_liveness() {
        let ctx = RelayContext::default();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(ctx.since_last_seen() >= Duration::from_secs(30));

        ctx.touch();
        assert!(ctx.since_last_seen() < Duration::from_secs(1));
    }
}
