// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory connector for unit tests.
//!
//! Every successful `connect` hands a [`MockSession`] to the test, which then
//! plays the hub: it pushes frames to the client and reads what the client
//! sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ProtocolError;

use super::{Connector, Frame, Transport};

/// Something the client wrote to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sent {
    Text(String),
    Ping,
    Close,
}

/// The hub's end of one mock connection.
pub(crate) struct MockSession {
    to_client: mpsc::UnboundedSender<Result<Frame, ProtocolError>>,
    from_client: mpsc::UnboundedReceiver<Sent>,
}

impl MockSession {
    pub(crate) fn send(&self, frame: Frame) {
        let _ = self.to_client.send(Ok(frame));
    }

    pub(crate) fn send_json(&self, value: &Value) {
        self.send(Frame::Text(value.to_string()));
    }

    pub(crate) fn fail(&self, error: ProtocolError) {
        let _ = self.to_client.send(Err(error));
    }

    pub(crate) async fn recv(&mut self) -> Option<Sent> {
        self.from_client.recv().await
    }

    /// Next JSON message from the client, skipping pings.
    pub(crate) async fn recv_json(&mut self) -> Option<Value> {
        loop {
            match self.recv().await? {
                Sent::Text(text) => return serde_json::from_str(&text).ok(),
                Sent::Ping => {}
                Sent::Close => return None,
            }
        }
    }

    /// Plays a successful handshake and checks what the client sent.
    pub(crate) async fn accept(&mut self) {
        self.send_json(&serde_json::json!({"type": "auth_required"}));
        let auth = self.recv_json().await.expect("auth message");
        assert_eq!(auth["type"], "auth");
        self.send_json(&serde_json::json!({"type": "auth_ok"}));
        let subscribe = self.recv_json().await.expect("subscribe message");
        assert_eq!(subscribe["type"], "subscribe_events");
        self.send_json(&serde_json::json!({"id": 1, "type": "result", "success": true}));
    }
}

struct Inner {
    attempts: AtomicUsize,
    refusals: Mutex<usize>,
    stalls: Mutex<usize>,
    stall_pings: AtomicBool,
    close_delay: Mutex<Duration>,
    sessions: mpsc::UnboundedSender<MockSession>,
}

/// Connector whose connections are driven by the test.
#[derive(Clone)]
pub(crate) struct MockConnector {
    inner: Arc<Inner>,
}

impl MockConnector {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<MockSession>) {
        let (sessions, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            attempts: AtomicUsize::new(0),
            refusals: Mutex::new(0),
            stalls: Mutex::new(0),
            stall_pings: AtomicBool::new(false),
            close_delay: Mutex::new(Duration::ZERO),
            sessions,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Makes the next `count` connection attempts fail.
    pub(crate) fn refuse_next(&self, count: usize) {
        *self.inner.refusals.lock() = count;
    }

    /// Makes the next `count` connection attempts hang forever.
    pub(crate) fn stall_next(&self, count: usize) {
        *self.inner.stalls.lock() = count;
    }

    /// Makes every ping write hang forever.
    pub(crate) fn stall_pings(&self) {
        self.inner.stall_pings.store(true, Ordering::SeqCst);
    }

    /// Makes closing a transport take `delay`.
    pub(crate) fn slow_close(&self, delay: Duration) {
        *self.inner.close_delay.lock() = delay;
    }

    /// Number of connection attempts so far.
    pub(crate) fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

/// Takes one from a countdown, returning true if it was positive.
fn take_one(counter: &Mutex<usize>) -> bool {
    let mut remaining = counter.lock();
    if *remaining == 0 {
        return false;
    }
    *remaining -= 1;
    true
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _url: &str) -> Result<MockTransport, ProtocolError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.inner.refusals) {
            return Err(ProtocolError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        if take_one(&self.inner.stalls) {
            std::future::pending::<()>().await;
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let _ = self.inner.sessions.send(MockSession {
            to_client,
            from_client,
        });
        Ok(MockTransport {
            inner: Arc::clone(&self.inner),
            inbound,
            outbound,
        })
    }
}

/// The client's end of one mock connection.
pub(crate) struct MockTransport {
    inner: Arc<Inner>,
    inbound: mpsc::UnboundedReceiver<Result<Frame, ProtocolError>>,
    outbound: mpsc::UnboundedSender<Sent>,
}

impl Transport for MockTransport {
    async fn send_text(&mut self, text: String) -> Result<(), ProtocolError> {
        self.outbound
            .send(Sent::Text(text))
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    async fn send_ping(&mut self) -> Result<(), ProtocolError> {
        if self.inner.stall_pings.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.outbound
            .send(Sent::Ping)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, ProtocolError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        let delay = *self.inner.close_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let _ = self.outbound.send(Sent::Close);
    }
}
