// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authentication and subscription handshake.
//!
//! Runs exactly once per connection, right after the transport opens:
//!
//! 1. wait for `auth_required`
//! 2. send `auth` with the access token
//! 3. wait for `auth_ok` (anything else is a rejection)
//! 4. send `subscribe_events` for [`SUBSCRIBED_EVENT_TYPE`]
//!
//! Only the greeting and the auth result are consumed. The subscription
//! result and every later frame are left to the receive loop.
//!
//! [`SUBSCRIBED_EVENT_TYPE`]: super::message::SUBSCRIBED_EVENT_TYPE

use std::time::Duration;

use crate::error::{HandshakeError, duration_ms};
use crate::state::{LinkState, RelayContext};

use super::{Frame, InboundMessage, OutboundMessage, Transport};

/// Authenticates and subscribes over a freshly opened transport.
///
/// Moves the link state to [`LinkState::AuthPending`] once the greeting
/// arrives. Each expected reply must arrive within `reply_timeout`.
///
/// # Errors
///
/// - [`HandshakeError::Rejected`] if the hub answers with anything but `auth_ok`
/// - [`HandshakeError::Timeout`] if a reply does not arrive in time
/// - [`HandshakeError::Failed`] for a missing or malformed greeting, an
///   unexpected frame, or a transport failure
pub async fn perform<T: Transport>(
    transport: &mut T,
    access_token: &str,
    reply_timeout: Duration,
    context: &RelayContext,
) -> Result<(), HandshakeError> {
    match next_message(transport, reply_timeout).await? {
        InboundMessage::AuthRequired { ha_version } => {
            tracing::debug!(ha_version = ?ha_version, "Hub requested authentication");
        }
        other => {
            return Err(HandshakeError::Failed(format!(
                "expected auth_required, got {}",
                other.kind()
            )));
        }
    }
    context.set_link_state(LinkState::AuthPending);

    send(transport, &OutboundMessage::Auth { access_token }).await?;

    match next_message(transport, reply_timeout).await? {
        InboundMessage::AuthOk => {}
        InboundMessage::AuthInvalid { message } => {
            return Err(HandshakeError::Rejected(
                message.unwrap_or_else(|| "auth_invalid".to_string()),
            ));
        }
        other => return Err(HandshakeError::Rejected(other.kind().to_string())),
    }
    tracing::info!("Authenticated with hub");

    send(transport, &OutboundMessage::subscribe_notifications()).await?;
    tracing::info!(
        event_type = super::message::SUBSCRIBED_EVENT_TYPE,
        "Subscribed to hub events"
    );

    Ok(())
}

/// Sends one handshake message.
async fn send<T: Transport>(
    transport: &mut T,
    message: &OutboundMessage<'_>,
) -> Result<(), HandshakeError> {
    let text = message
        .to_json()
        .map_err(|e| HandshakeError::Failed(e.to_string()))?;
    transport
        .send_text(text)
        .await
        .map_err(|e| HandshakeError::Failed(format!("failed to send {}: {e}", message.kind())))
}

/// Waits for the next decoded message, skipping control frames.
async fn next_message<T: Transport>(
    transport: &mut T,
    reply_timeout: Duration,
) -> Result<InboundMessage, HandshakeError> {
    let wait = async {
        loop {
            match transport.next_frame().await {
                Some(Ok(Frame::Text(text))) => {
                    return InboundMessage::decode(&text)
                        .map_err(|e| HandshakeError::Failed(format!("malformed message: {e}")));
                }
                Some(Ok(Frame::Ping | Frame::Pong)) => {}
                Some(Ok(Frame::Binary(_))) => {
                    return Err(HandshakeError::Failed(
                        "unexpected binary frame".to_string(),
                    ));
                }
                Some(Ok(Frame::Close(reason))) => {
                    return Err(HandshakeError::Failed(format!(
                        "hub closed the connection: {}",
                        reason.as_deref().unwrap_or("no reason")
                    )));
                }
                Some(Err(e)) => return Err(HandshakeError::Failed(e.to_string())),
                None => {
                    return Err(HandshakeError::Failed(
                        "connection ended during handshake".to_string(),
                    ));
                }
            }
        }
    };

    tokio::time::timeout(reply_timeout, wait)
        .await
        .map_err(|_| HandshakeError::Timeout(duration_ms(reply_timeout)))?
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::mock::{MockConnector, Sent};
    use crate::protocol::Connector;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn successful_handshake_subscribes() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub/api/websocket").await.unwrap();
        let mut hub = sessions.recv().await.unwrap();
        let ctx = RelayContext::default();

        hub.send_json(&json!({"type": "auth_required", "ha_version": "2024.6.0"}));
        hub.send_json(&json!({"type": "auth_ok"}));

        perform(&mut transport, "token-1", TIMEOUT, &ctx)
            .await
            .unwrap();

        assert_eq!(
            hub.recv_json().await,
            Some(json!({"type": "auth", "access_token": "token-1"}))
        );
        assert_eq!(
            hub.recv_json().await,
            Some(json!({"id": 1, "type": "subscribe_events", "event_type": "steamdeck_notify"}))
        );
        assert_eq!(ctx.link_state(), LinkState::AuthPending);
    }

    #[tokio::test]
    async fn rejected_auth_does_not_subscribe() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub").await.unwrap();
        let mut hub = sessions.recv().await.unwrap();
        let ctx = RelayContext::default();

        hub.send_json(&json!({"type": "auth_required"}));
        hub.send_json(&json!({"type": "auth_invalid", "message": "Invalid access token"}));

        let err = perform(&mut transport, "bad", TIMEOUT, &ctx)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HandshakeError::Rejected("Invalid access token".to_string())
        );

        drop(transport);
        assert!(matches!(hub.recv().await, Some(Sent::Text(_))));
        assert_eq!(hub.recv().await, None);
    }

    #[tokio::test]
    async fn any_other_auth_reply_is_rejection() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub").await.unwrap();
        let hub = sessions.recv().await.unwrap();
        let ctx = RelayContext::default();

        hub.send_json(&json!({"type": "auth_required"}));
        hub.send_json(&json!({"type": "result", "success": true}));

        let err = perform(&mut transport, "t", TIMEOUT, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, HandshakeError::Rejected("result".to_string()));
    }

    #[tokio::test]
    async fn wrong_greeting_fails() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub").await.unwrap();
        let hub = sessions.recv().await.unwrap();
        let ctx = RelayContext::default();

        hub.send_json(&json!({"type": "event"}));

        let err = perform(&mut transport, "t", TIMEOUT, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Failed(_)));
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn malformed_greeting_fails() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub").await.unwrap();
        let hub = sessions.recv().await.unwrap();

        hub.send(Frame::Text("{not json".to_string()));

        let err = perform(&mut transport, "t", TIMEOUT, &RelayContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Failed(_)));
    }

    #[tokio::test]
    async fn control_frames_are_skipped() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub").await.unwrap();
        let hub = sessions.recv().await.unwrap();

        hub.send(Frame::Ping);
        hub.send_json(&json!({"type": "auth_required"}));
        hub.send(Frame::Pong);
        hub.send_json(&json!({"type": "auth_ok"}));

        perform(&mut transport, "t", TIMEOUT, &RelayContext::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn closed_connection_fails() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub").await.unwrap();
        let hub = sessions.recv().await.unwrap();
        drop(hub);

        let err = perform(&mut transport, "t", TIMEOUT, &RelayContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_hub_times_out() {
        let (connector, mut sessions) = MockConnector::new();
        let mut transport = connector.connect("ws://hub").await.unwrap();
        let _hub = sessions.recv().await.unwrap();

        let err = perform(&mut transport, "t", TIMEOUT, &RelayContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, HandshakeError::Timeout(10_000));
    }
}
