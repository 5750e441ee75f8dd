// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Watchdog for silent links.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::state::RelayContext;

/// Smallest period accepted for the monitor and keepalive timers.
pub(crate) const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Severs a subscribed session that stopped receiving frames.
///
/// One monitor runs per session. It wakes every `interval` and compares the
/// time since the last received frame with `threshold`. When the link is
/// stale it cancels the session's sever token once and exits; the receive
/// loop then closes the transport.
#[derive(Debug)]
pub struct HealthMonitor {
    context: Arc<RelayContext>,
    interval: Duration,
    threshold: Duration,
}

impl HealthMonitor {
    /// Creates a monitor reading liveness from `context`.
    ///
    /// An `interval` below one millisecond is raised to one millisecond.
    #[must_use]
    pub fn new(context: Arc<RelayContext>, interval: Duration, threshold: Duration) -> Self {
        Self {
            context,
            interval: interval.max(MIN_TIMER_PERIOD),
            threshold,
        }
    }

    /// Runs until the link goes stale or `stop` is cancelled.
    ///
    /// Returns true if the monitor severed the link.
    pub async fn run(self, stop: CancellationToken, sever: CancellationToken) -> bool {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = stop.cancelled() => return false,
                _ = ticker.tick() => {}
            }

            let silent_for = self.context.since_last_seen();
            if silent_for > self.threshold {
                tracing::warn!(
                    silent_secs = silent_for.as_secs(),
                    threshold_secs = self.threshold.as_secs(),
                    "Link is stale, forcing reconnect"
                );
                sever.cancel();
                return true;
            }

            tracing::trace!(silent_secs = silent_for.as_secs(), "Link healthy");
        }
    }
}
