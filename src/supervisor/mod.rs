// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection supervisor.
//!
//! The [`Supervisor`] owns the whole connection lifecycle and keeps a
//! subscribed link to the hub for as long as it is not cancelled:
//!
//! ```text
//! Disconnected ─► Connecting ─► AuthPending ─► Subscribed
//!      ▲              │              │              │
//!      └── backoff ◄──┴──────────────┴──────────────┘
//!
//! any state ── cancel ──► Cancelled
//! ```
//!
//! Every failure is classified into a [`FailureKind`] and followed by the
//! fixed delay from the [`BackoffPolicy`]. While subscribed, a
//! [`HealthMonitor`] watches the liveness timestamp and severs the session
//! if the hub goes silent.

mod backoff;
mod health;

pub use backoff::{
    AUTH_BACKOFF, BackoffPolicy, FailureKind, OTHER_BACKOFF, TIMEOUT_BACKOFF, TRANSPORT_BACKOFF,
};
pub use health::HealthMonitor;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Timings};
use crate::error::{ProtocolError, SessionError, duration_ms};
use crate::notification::now_timestamp;
use crate::protocol::{Connector, Frame, InboundMessage, Transport, handshake};
use crate::state::{LinkState, RelayContext};

use health::MIN_TIMER_PERIOD;

/// How a session ended.
enum SessionEnd {
    /// The supervisor was cancelled; do not retry.
    Cancelled,
    /// The session failed; back off and retry.
    Failed(SessionError),
}

/// What woke the receive loop.
enum Step {
    Cancelled,
    Stale,
    Keepalive,
    Frame(Option<Result<Frame, ProtocolError>>),
}

/// Keeps a subscribed connection to the hub alive until cancelled.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ha_notify::config::{Config, Timings};
/// use ha_notify::protocol::WsConnector;
/// use ha_notify::state::RelayContext;
/// use ha_notify::supervisor::Supervisor;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), ha_notify::Error> {
/// let config = Config::new("http://homeassistant.local:8123", "token")?;
/// let context = Arc::new(RelayContext::default());
/// let cancel = CancellationToken::new();
///
/// let supervisor = Supervisor::new(WsConnector::new(), config, Timings::default(), context);
/// let handle = tokio::spawn(supervisor.run(cancel.clone()));
///
/// // Later, during shutdown
/// cancel.cancel();
/// let _ = handle.await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Supervisor<C: Connector> {
    connector: C,
    config: Config,
    timings: Timings,
    context: Arc<RelayContext>,
}

impl<C: Connector> Supervisor<C> {
    /// Creates a supervisor; nothing happens until [`run`](Self::run).
    #[must_use]
    pub fn new(connector: C, config: Config, timings: Timings, context: Arc<RelayContext>) -> Self {
        Self {
            connector,
            config,
            timings,
            context,
        }
    }

    /// Returns the shared context the supervisor writes to.
    #[must_use]
    pub fn context(&self) -> &Arc<RelayContext> {
        &self.context
    }

    /// Runs the connect / subscribe / receive / backoff loop until `cancel`
    /// is cancelled.
    ///
    /// On return no session task is left running, the transport is closed
    /// and the link state is [`LinkState::Cancelled`].
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(url = %self.config.websocket_url(), "Connection supervisor started");

        while !cancel.is_cancelled() {
            let error = match self.run_session(&cancel).await {
                SessionEnd::Cancelled => break,
                SessionEnd::Failed(error) => error,
            };

            let kind = error.kind();
            let delay = self.timings.backoff.delay_for(kind);
            self.context.set_link_state(LinkState::Disconnected);
            self.context.set_last_error(Some(error.to_string()));
            log_failure(kind, &error, delay);

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.context.set_link_state(LinkState::Cancelled);
        tracing::info!("Connection supervisor stopped");
    }

    /// One connection attempt, from connect to teardown.
    async fn run_session(&self, cancel: &CancellationToken) -> SessionEnd {
        self.context.set_link_state(LinkState::Connecting);

        let url = self.config.websocket_url();
        let connect_timeout = self.timings.connect_timeout;
        tracing::info!(url = %url, "Connecting to hub");

        let connect = tokio::time::timeout(connect_timeout, self.connector.connect(url));
        let result = tokio::select! {
            () = cancel.cancelled() => return SessionEnd::Cancelled,
            result = connect => result,
        };
        let mut transport = match result {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => return SessionEnd::Failed(e.into()),
            Err(_) => {
                return SessionEnd::Failed(SessionError::Transport(
                    ProtocolError::ConnectionFailed(format!(
                        "connect timed out after {} ms",
                        duration_ms(connect_timeout)
                    )),
                ));
            }
        };

        let end = self.drive(&mut transport, cancel).await;

        self.context.set_link_state(LinkState::Closing);
        if tokio::time::timeout(self.timings.handshake_timeout, transport.close())
            .await
            .is_err()
        {
            tracing::debug!("Timed out closing transport");
        }

        end
    }

    /// Handshake, then receive until the session ends.
    async fn drive(&self, transport: &mut C::Transport, cancel: &CancellationToken) -> SessionEnd {
        let handshake = handshake::perform(
            transport,
            self.config.access_token(),
            self.timings.handshake_timeout,
            &self.context,
        );
        let result = tokio::select! {
            () = cancel.cancelled() => return SessionEnd::Cancelled,
            result = handshake => result,
        };
        if let Err(e) = result {
            return SessionEnd::Failed(e.into());
        }

        self.context.touch();
        self.context.set_last_error(None);
        self.context.set_link_state(LinkState::Subscribed);

        let stop = cancel.child_token();
        let sever = CancellationToken::new();
        let monitor = HealthMonitor::new(
            Arc::clone(&self.context),
            self.timings.monitor_interval,
            self.timings.stale_threshold,
        );
        let monitor = tokio::spawn(monitor.run(stop.clone(), sever.clone()));

        let end = self.receive_loop(transport, cancel, &sever).await;

        // The monitor must be gone before the next session starts
        stop.cancel();
        if let Err(e) = monitor.await
            && e.is_panic()
        {
            tracing::error!(error = %e, "Health monitor panicked");
        }

        end
    }

    /// Reads frames until cancellation, a stale link or a failure.
    async fn receive_loop(
        &self,
        transport: &mut C::Transport,
        cancel: &CancellationToken,
        sever: &CancellationToken,
    ) -> SessionEnd {
        let period = self.timings.keepalive_interval.max(MIN_TIMER_PERIOD);
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Cancelled,
                () = sever.cancelled() => Step::Stale,
                _ = keepalive.tick() => Step::Keepalive,
                frame = transport.next_frame() => Step::Frame(frame),
            };

            match step {
                Step::Cancelled => return SessionEnd::Cancelled,
                Step::Stale => return self.stale_link(),
                Step::Keepalive => {
                    // A stalled write must not hold off cancellation
                    let sent = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return SessionEnd::Cancelled,
                        () = sever.cancelled() => return self.stale_link(),
                        sent = transport.send_ping() => sent,
                    };
                    if let Err(e) = sent {
                        return SessionEnd::Failed(e.into());
                    }
                }
                Step::Frame(None) => {
                    return SessionEnd::Failed(SessionError::LinkLost(
                        "connection ended".to_string(),
                    ));
                }
                Step::Frame(Some(Err(e))) => return SessionEnd::Failed(e.into()),
                Step::Frame(Some(Ok(frame))) => {
                    self.context.touch();
                    match frame {
                        Frame::Text(text) => self.handle_text(&text),
                        Frame::Close(reason) => {
                            return SessionEnd::Failed(SessionError::LinkLost(format!(
                                "hub closed the connection ({})",
                                reason.as_deref().unwrap_or("no reason")
                            )));
                        }
                        Frame::Ping | Frame::Pong | Frame::Binary(_) => {}
                    }
                }
            }
        }
    }

    fn stale_link(&self) -> SessionEnd {
        SessionEnd::Failed(SessionError::LinkLost(format!(
            "no frame received for over {}s",
            self.timings.stale_threshold.as_secs()
        )))
    }

    /// Buffers event frames; everything else is only logged.
    fn handle_text(&self, text: &str) {
        match InboundMessage::decode(text) {
            Ok(InboundMessage::Event(payload)) => {
                tracing::info!(
                    title = payload.title.as_deref().unwrap_or_default(),
                    message = payload.message.as_deref().unwrap_or_default(),
                    "Received notification"
                );
                self.context.notifications().record(
                    payload.title.as_deref(),
                    payload.message.as_deref(),
                    now_timestamp(),
                    payload.action.as_deref(),
                );
            }
            Ok(InboundMessage::Result { id, success: true }) => {
                tracing::debug!(id = ?id, "Hub acknowledged request");
            }
            Ok(InboundMessage::Result { id, success: false }) => {
                tracing::warn!(id = ?id, "Hub rejected request");
            }
            Ok(other) => {
                tracing::trace!(kind = other.kind(), "Ignoring hub message");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable frame");
            }
        }
    }
}

/// Logs a failed session at the level its class deserves.
fn log_failure(kind: FailureKind, error: &SessionError, delay: Duration) {
    let delay_secs = delay.as_secs_f64();
    match kind {
        FailureKind::Authentication => {
            tracing::error!(error = %error, delay_secs, "Hub rejected authentication, retrying");
        }
        FailureKind::Transport => {
            tracing::warn!(error = %error, delay_secs, "Cannot reach hub, retrying");
        }
        FailureKind::Timeout => {
            tracing::warn!(error = %error, delay_secs, "Hub did not answer in time, retrying");
        }
        FailureKind::Other if matches!(error, SessionError::LinkLost(_)) => {
            tracing::warn!(error = %error, delay_secs, "Link to hub lost, reconnecting");
        }
        FailureKind::Other => {
            tracing::error!(error = %error, delay_secs, "Hub session failed, retrying");
        }
    }
}
