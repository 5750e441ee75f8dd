// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket transport built on `tokio-tungstenite`.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::ProtocolError;

use super::{Connector, Frame, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the hub over `ws://` or `wss://` (rustls, webpki roots).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a new connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<WsTransport, ProtocolError> {
        tracing::debug!(url = %url, "Opening WebSocket");
        let (stream, response) = connect_async(url).await.map_err(|e| match e {
            tungstenite::Error::Url(e) => ProtocolError::InvalidAddress(e.to_string()),
            tungstenite::Error::Io(e) => ProtocolError::ConnectionFailed(e.to_string()),
            other => other.into(),
        })?;
        tracing::debug!(status = %response.status(), "WebSocket upgrade complete");
        Ok(WsTransport { stream })
    }
}

/// An open WebSocket connection to the hub.
pub struct WsTransport {
    stream: WsStream,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport").finish_non_exhaustive()
    }
}

impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), ProtocolError> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn send_ping(&mut self) -> Result<(), ProtocolError> {
        self.stream.send(Message::Ping(Vec::new().into())).await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, ProtocolError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => Frame::Binary(data.to_vec()),
                Ok(Message::Ping(_)) => Frame::Ping,
                Ok(Message::Pong(_)) => Frame::Pong,
                Ok(Message::Close(close)) => {
                    Frame::Close(close.map(|c| format!("{} {}", u16::from(c.code), c.reason.as_str())))
                }
                // Raw frames are never surfaced while reading
                Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
