// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Home Assistant WebSocket API messages.
//!
//! Only the handful of messages the relay exchanges are modelled:
//!
//! ```text
//! hub    → client  {"type": "auth_required", "ha_version": "..."}
//! client → hub     {"type": "auth", "access_token": "..."}
//! hub    → client  {"type": "auth_ok"} | {"type": "auth_invalid", "message": "..."}
//! client → hub     {"id": 1, "type": "subscribe_events", "event_type": "steamdeck_notify"}
//! hub    → client  {"id": 1, "type": "result", "success": true}
//! hub    → client  {"id": 1, "type": "event", "event": {"data": {...}}}   (repeating)
//! ```
//!
//! Decoding never rejects an event because of its payload: missing or
//! oddly typed fields are left empty and defaulted later.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// Event type the relay subscribes to.
pub const SUBSCRIBED_EVENT_TYPE: &str = "steamdeck_notify";

/// Request id of the single `subscribe_events` request.
pub const SUBSCRIPTION_ID: u64 = 1;

/// A message sent to the hub.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage<'a> {
    /// Answer to `auth_required`.
    Auth {
        /// Long-lived access token.
        access_token: &'a str,
    },
    /// Subscription request for one event type.
    SubscribeEvents {
        /// Request id.
        id: u64,
        /// Event type to receive.
        event_type: &'a str,
    },
}

impl OutboundMessage<'_> {
    /// The subscription request the relay sends after authenticating.
    #[must_use]
    pub fn subscribe_notifications() -> OutboundMessage<'static> {
        OutboundMessage::SubscribeEvents {
            id: SUBSCRIPTION_ID,
            event_type: SUBSCRIBED_EVENT_TYPE,
        }
    }

    /// Encodes the message as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, ParseError> {
        serde_json::to_string(self).map_err(Into::into)
    }

    /// Returns the wire `type` of the message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::SubscribeEvents { .. } => "subscribe_events",
        }
    }
}

impl std::fmt::Debug for OutboundMessage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth { .. } => f
                .debug_struct("Auth")
                .field("access_token", &"<redacted>")
                .finish(),
            Self::SubscribeEvents { id, event_type } => f
                .debug_struct("SubscribeEvents")
                .field("id", id)
                .field("event_type", event_type)
                .finish(),
        }
    }
}

/// Fields of a notification event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventPayload {
    /// Event type reported by the hub.
    pub event_type: Option<String>,
    /// Notification title.
    pub title: Option<String>,
    /// Notification body.
    pub message: Option<String>,
    /// URL or deep link to open.
    pub action: Option<String>,
}

/// A message received from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Greeting sent right after the connection opens.
    AuthRequired {
        /// Hub version, if announced.
        ha_version: Option<String>,
    },
    /// Authentication succeeded.
    AuthOk,
    /// Authentication failed.
    AuthInvalid {
        /// Reason given by the hub.
        message: Option<String>,
    },
    /// Acknowledgement of a request.
    Result {
        /// Request id the result answers.
        id: Option<u64>,
        /// Whether the request succeeded.
        success: bool,
    },
    /// A subscribed event.
    Event(EventPayload),
    /// Any other message type.
    Other(String),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    ha_version: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    success: Option<Value>,
    #[serde(default)]
    event: Option<Value>,
}

impl InboundMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns error if the frame is not a JSON object or has no string
    /// `type` field.
    pub fn decode(text: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ParseError::UnexpectedFormat(
                "message is not a JSON object".to_string(),
            ));
        }

        let raw: RawMessage = serde_json::from_value(value)
            .map_err(|e| ParseError::UnexpectedFormat(e.to_string()))?;
        let Some(kind) = raw.kind else {
            return Err(ParseError::MissingField("type".to_string()));
        };

        let message = match kind.as_str() {
            "auth_required" => Self::AuthRequired {
                ha_version: raw.ha_version.as_ref().and_then(text_of),
            },
            "auth_ok" => Self::AuthOk,
            "auth_invalid" => Self::AuthInvalid {
                message: raw.message.as_ref().and_then(text_of),
            },
            "result" => Self::Result {
                id: raw.id.as_ref().and_then(Value::as_u64),
                success: raw.success.as_ref().and_then(Value::as_bool).unwrap_or(false),
            },
            "event" => Self::Event(event_payload(raw.event.as_ref())),
            _ => Self::Other(kind),
        };

        Ok(message)
    }

    /// Returns the wire `type` of the message.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::AuthRequired { .. } => "auth_required",
            Self::AuthOk => "auth_ok",
            Self::AuthInvalid { .. } => "auth_invalid",
            Self::Result { .. } => "result",
            Self::Event(_) => "event",
            Self::Other(kind) => kind,
        }
    }
}

/// Extracts the notification fields from an `event` object.
fn event_payload(event: Option<&Value>) -> EventPayload {
    let Some(event) = event else {
        return EventPayload::default();
    };
    let data = event.get("data");
    let field = |key: &str| data.and_then(|d| d.get(key)).and_then(text_of);

    EventPayload {
        event_type: event.get("event_type").and_then(text_of),
        title: field("title"),
        message: field("message"),
        action: field("action"),
    }
}

/// Renders a JSON value as text; `null` counts as absent.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
