// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ha-notify`: runs the relay and logs every notification it receives.
//!
//! Configuration comes from the JSON file named by `HA_NOTIFY_CONFIG`, or
//! else from `HA_URL` and `HA_TOKEN`. Log verbosity follows `RUST_LOG`
//! (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use ha_notify::{ConfigSource, Relay};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

/// Names a JSON configuration file to use instead of the environment.
const CONFIG_PATH_VAR: &str = "HA_NOTIFY_CONFIG";

/// How often pending notifications are drained.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let source = std::env::var_os(CONFIG_PATH_VAR)
        .map_or(ConfigSource::Env, |path| ConfigSource::File(PathBuf::from(path)));

    let relay = Relay::new();
    if let Err(e) = relay.start(&source) {
        tracing::error!(error = %e, "Failed to start");
        return ExitCode::FAILURE;
    }

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Cannot listen for Ctrl-C");
                }
                break;
            }
            _ = poll.tick() => {
                for notification in relay.get_pending_notifications() {
                    tracing::info!(
                        title = notification.title(),
                        message = notification.message(),
                        action = notification.action(),
                        timestamp = notification.timestamp(),
                        "Notification"
                    );
                }
            }
        }
    }

    tracing::info!("Shutting down");
    relay.stop().await;

    let stats = relay.get_stats();
    tracing::info!(
        status = %stats.status,
        undelivered = stats.pending_count,
        dropped = stats.dropped,
        "Stopped"
    );
    ExitCode::SUCCESS
}
