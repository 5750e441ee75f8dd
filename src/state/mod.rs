// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay state shared between tasks.
//!
//! [`RelayContext`] is the one owned piece of mutable state of a relay. The
//! supervisor, the health monitor and the host facade all hold an `Arc` to
//! it instead of reaching for globals.
//!
//! # Examples
//!
//! ```
//! use ha_notify::state::{LinkState, RelayContext, ServiceStatus};
//!
//! let ctx = RelayContext::default();
//! assert_eq!(ctx.link_state(), LinkState::Disconnected);
//! assert_eq!(ctx.service_status(), ServiceStatus::Idle);
//! ```

mod context;
mod link_state;

pub use context::RelayContext;
pub use link_state::{LinkState, ServiceStatus};
