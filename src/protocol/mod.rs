// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub protocol: transport abstraction, wire messages and handshake.
//!
//! The supervisor talks to the hub through two traits:
//!
//! - [`Connector`]: opens a new [`Transport`] for a URL
//! - [`Transport`]: sends text and pings, yields inbound [`Frame`]s, closes
//!
//! [`WsConnector`] is the production implementation on top of
//! `tokio-tungstenite`. Tests plug in an in-memory connector instead.

pub mod handshake;
pub mod message;
mod websocket;

#[cfg(test)]
pub(crate) mod mock;

pub use message::{EventPayload, InboundMessage, OutboundMessage};
pub use websocket::{WsConnector, WsTransport};

use std::future::Future;

use crate::error::ProtocolError;

/// One frame received from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text message, normally JSON.
    Text(String),
    /// A binary message; the hub never sends these for our subscription.
    Binary(Vec<u8>),
    /// Protocol-level ping.
    Ping,
    /// Protocol-level pong.
    Pong,
    /// The hub is closing the connection.
    Close(Option<String>),
}

/// A bidirectional connection to the hub.
///
/// Futures returned by the transport must be `Send` so the supervisor can
/// run on a multi-threaded runtime.
pub trait Transport: Send {
    /// Sends a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the frame cannot be written.
    fn send_text(&mut self, text: String)
    -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Sends a protocol-level ping.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the frame cannot be written.
    fn send_ping(&mut self) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Waits for the next inbound frame.
    ///
    /// Returns `None` once the connection has ended. Must be cancel-safe:
    /// dropping the future before it completes loses no frame.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame, ProtocolError>>> + Send;

    /// Closes the connection. Errors are logged, not returned.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports to the hub.
pub trait Connector: Clone + Send + Sync + 'static {
    /// Transport produced by this connector.
    type Transport: Transport + 'static;

    /// Connects to the given WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the connection cannot be established.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Transport, ProtocolError>> + Send;
}
