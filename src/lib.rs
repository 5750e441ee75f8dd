// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `HA Notify` - relay Home Assistant events to a polling host.
//!
//! The crate keeps one outbound WebSocket link to a Home Assistant hub,
//! authenticates with a long-lived access token, subscribes to
//! `steamdeck_notify` events and buffers each one as a [`Notification`]
//! until the host drains it.
//!
//! # Features
//!
//! - **Self-healing link**: every failure is classified and retried forever
//!   with a fixed per-class delay
//! - **Stale link detection**: a health monitor severs sessions that stop
//!   receiving frames; WebSocket pings keep idle links observable
//! - **Polling API**: [`Relay::get_pending_notifications`] drains the buffer,
//!   [`Relay::get_stats`] reports state without side effects
//! - **Clean shutdown**: [`Relay::stop`] returns only once the transport is
//!   closed and no background task is left
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use ha_notify::{ConfigSource, Relay};
//!
//! #[tokio::main]
//! async fn main() -> ha_notify::Result<()> {
//!     let relay = Relay::new();
//!     relay.start(&ConfigSource::explicit(
//!         "http://homeassistant.local:8123",
//!         "long-lived-access-token",
//!     ))?;
//!
//!     loop {
//!         for notification in relay.get_pending_notifications() {
//!             println!("{}: {}", notification.title(), notification.message());
//!         }
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!     }
//! }
//! ```
//!
//! # Configuration
//!
//! [`ConfigSource`] reads the hub URL and token from the environment
//! (`HA_URL`, `HA_TOKEN`), from a JSON file, or from values supplied by the
//! host. Timers and backoff delays are set through
//! [`Timings`](config::Timings).
//!
//! # Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber.

pub mod config;
pub mod error;
pub mod notification;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod status;
pub mod supervisor;

pub use config::{Config, ConfigSource, Timings};
pub use error::{ConfigError, Error, HandshakeError, ProtocolError, Result};
pub use notification::{Notification, NotificationBuffer};
pub use relay::{Relay, RelayBuilder};
pub use state::{LinkState, RelayContext, ServiceStatus};
pub use status::{Stats, StatusReporter};
pub use supervisor::{BackoffPolicy, FailureKind, Supervisor};
