// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-facing relay.
//!
//! [`Relay`] is what the host talks to. It loads the configuration, spawns
//! the connection [`Supervisor`] and exposes the two polling operations:
//! draining pending notifications and reading [`Stats`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigSource, Timings};
use crate::error::{Error, Result};
use crate::notification::{Notification, NotificationBuffer, now_timestamp};
use crate::protocol::{Connector, WsConnector};
use crate::state::{RelayContext, ServiceStatus};
use crate::status::{Stats, StatusReporter};
use crate::supervisor::Supervisor;

/// Title of the notification recorded by [`Relay::send_test_notification`].
pub const TEST_NOTIFICATION_TITLE: &str = "Test Notification";

/// Message of the notification recorded by [`Relay::send_test_notification`].
pub const TEST_NOTIFICATION_MESSAGE: &str = "This is a test from HA Notify!";

/// A spawned supervisor and the token that stops it.
struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Relays hub notifications to a polling host.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use ha_notify::{ConfigSource, Relay};
///
/// #[tokio::main]
/// async fn main() -> ha_notify::Result<()> {
///     let relay = Relay::new();
///     relay.start(&ConfigSource::Env)?;
///
///     for _ in 0..10 {
///         for notification in relay.get_pending_notifications() {
///             println!("{}: {}", notification.title(), notification.message());
///         }
///         tokio::time::sleep(Duration::from_secs(1)).await;
///     }
///
///     relay.stop().await;
///     Ok(())
/// }
/// ```
pub struct Relay<C: Connector = WsConnector> {
    connector: C,
    timings: Timings,
    context: Arc<RelayContext>,
    reporter: StatusReporter,
    /// Held across the whole teardown in [`Relay::stop`], so a start can
    /// never overlap a supervisor that is still shutting down.
    running: Mutex<Option<Running>>,
}

impl Relay {
    /// Creates a relay with default timings and buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder for a relay over the WebSocket connector.
    #[must_use]
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new(WsConnector::new())
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> Relay<C> {
    /// Loads the configuration from `source` and starts the supervisor.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyRunning`] if the relay was started and not stopped
    /// - [`Error::Config`] if the configuration is missing or invalid; the
    ///   relay is then marked [`ServiceStatus::Unavailable`] and nothing is
    ///   spawned
    pub fn start(&self, source: &ConfigSource) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }

        let config = match source.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Cannot start relay without valid configuration");
                self.context.set_service_status(ServiceStatus::Unavailable);
                self.context.set_last_error(Some(e.to_string()));
                return Err(e.into());
            }
        };

        self.start_with_config(config)
    }

    /// Starts the supervisor with an already loaded configuration.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] if the relay was started and not
    /// stopped, or a stop is still tearing the previous run down.
    pub fn start_with_config(&self, config: Config) -> Result<()> {
        let Ok(mut running) = self.running.try_lock() else {
            return Err(Error::AlreadyRunning);
        };
        if running.is_some() {
            return Err(Error::AlreadyRunning);
        }

        tracing::info!(hub_url = %config.hub_url(), "Starting relay");
        self.context.set_hub_url(Some(config.hub_url().to_string()));
        self.context.set_last_error(None);
        self.context.set_service_status(ServiceStatus::Running);

        let cancel = CancellationToken::new();
        let supervisor = Supervisor::new(
            self.connector.clone(),
            config,
            self.timings.clone(),
            Arc::clone(&self.context),
        );
        let handle = tokio::spawn(supervisor.run(cancel.clone()));
        *running = Some(Running { cancel, handle });

        Ok(())
    }

    /// Stops the supervisor and waits for its teardown.
    ///
    /// When this returns, the transport is closed and no background task is
    /// left. Calling it on a relay that is not running does nothing.
    pub async fn stop(&self) {
        let mut slot = self.running.lock().await;
        let Some(running) = slot.as_mut() else {
            return;
        };

        running.cancel.cancel();
        let joined = (&mut running.handle).await;
        *slot = None;
        if let Err(e) = joined
            && e.is_panic()
        {
            tracing::error!(error = %e, "Connection supervisor panicked");
        }

        self.context.set_service_status(ServiceStatus::Stopped);
        drop(slot);
        tracing::info!("Relay stopped");
    }

    /// Returns true from a successful start until the matching stop has
    /// finished tearing down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        match self.running.try_lock() {
            Ok(slot) => slot.is_some(),
            Err(_) => true,
        }
    }

    /// Takes every buffered notification, oldest first.
    ///
    /// Each notification is returned by exactly one call.
    #[must_use]
    pub fn get_pending_notifications(&self) -> Vec<Notification> {
        self.context.notifications().drain_all()
    }

    /// Returns a snapshot of the relay's state.
    #[must_use]
    pub fn get_stats(&self) -> Stats {
        self.reporter.snapshot()
    }

    /// Buffers a fixed test notification, as if the hub had sent it.
    pub fn send_test_notification(&self) {
        tracing::debug!("Recording test notification");
        self.context.notifications().record(
            Some(TEST_NOTIFICATION_TITLE),
            Some(TEST_NOTIFICATION_MESSAGE),
            now_timestamp(),
            None,
        );
    }

    /// Returns the shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<RelayContext> {
        &self.context
    }
}

impl<C: Connector> std::fmt::Debug for Relay<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("timings", &self.timings)
            .field("context", &self.context)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Drop for Relay<C> {
    fn drop(&mut self) {
        // A dropped relay must not leave the supervisor running
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

/// Builder for [`Relay`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ha_notify::Relay;
/// use ha_notify::config::Timings;
///
/// let relay = Relay::builder()
///     .with_timings(Timings::default().with_stale_threshold(Duration::from_secs(120)))
///     .with_buffer_capacity(200)
///     .build();
/// assert_eq!(relay.context().notifications().capacity(), Some(200));
/// ```
#[derive(Debug)]
pub struct RelayBuilder<C: Connector = WsConnector> {
    connector: C,
    timings: Timings,
    buffer: NotificationBuffer,
}

impl<C: Connector> RelayBuilder<C> {
    /// Creates a builder over a custom connector.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            timings: Timings::default(),
            buffer: NotificationBuffer::new(),
        }
    }

    /// Sets the timers, timeouts and backoff delays.
    #[must_use]
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Bounds the notification buffer; the oldest entry is dropped on overflow.
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer = NotificationBuffer::with_capacity(capacity);
        self
    }

    /// Lets the notification buffer grow without bound.
    #[must_use]
    pub fn with_unbounded_buffer(mut self) -> Self {
        self.buffer = NotificationBuffer::unbounded();
        self
    }

    /// Builds the relay. Nothing connects until [`Relay::start`].
    #[must_use]
    pub fn build(self) -> Relay<C> {
        let context = Arc::new(RelayContext::new(self.buffer));
        Relay {
            connector: self.connector,
            timings: self.timings,
            reporter: StatusReporter::new(Arc::clone(&context)),
            context,
            running: Mutex::new(None),
        }
    }
}
