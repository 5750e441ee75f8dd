// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buffer of notifications awaiting the host.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::Notification;

/// Default number of notifications kept before the oldest is evicted.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Ordered, thread-safe queue of pending notifications.
///
/// The receive loop appends and the host drains. Both operations take the
/// same lock for a short, non-blocking critical section, so a concurrent
/// `record` lands either entirely before or entirely after a drain.
///
/// When the buffer is full the oldest notification is evicted; the number
/// of evictions is reported by [`dropped`](Self::dropped).
#[derive(Debug)]
pub struct NotificationBuffer {
    queue: Mutex<VecDeque<Notification>>,
    capacity: Option<usize>,
    dropped: AtomicU64,
}

impl NotificationBuffer {
    /// Creates a buffer with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates a buffer holding at most `capacity` notifications.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: Some(capacity.max(1)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Creates a buffer that never evicts.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: None,
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends a notification built from possibly missing event fields.
    pub fn record(
        &self,
        title: Option<&str>,
        message: Option<&str>,
        timestamp: f64,
        action: Option<&str>,
    ) {
        self.push(Notification::new(title, message, timestamp, action));
    }

    /// Appends a notification.
    pub fn push(&self, notification: Notification) {
        let mut queue = self.queue.lock();
        if let Some(capacity) = self.capacity {
            while queue.len() >= capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        queue.push_back(notification);
    }

    /// Returns every buffered notification in arrival order and empties the
    /// buffer in the same step.
    #[must_use]
    pub fn drain_all(&self) -> Vec<Notification> {
        let mut queue = self.queue.lock();
        std::mem::take(&mut *queue).into()
    }

    /// Returns the number of pending notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if no notification is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Returns the capacity, or `None` if unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns how many notifications were evicted because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for NotificationBuffer {
    fn default() -> Self {
        Self::new()
    }
}
