// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pk-alerts: human-readable alerting.
//!
//! Renders per-event-type message templates, enforces the cooldown between
//! alerts sharing a dedup key, and delivers through whatever transports are
//! configured (webhook, SMTP). Transports are best-effort; a failure is
//! logged and never blocks the next alert.

mod cooldown;
mod template;
mod transport;

pub use cooldown::CooldownTracker;
pub use template::render;
pub use transport::{AlertError, AlertTransport, EmailConfig, EmailTransport, WebhookTransport};

#[cfg(any(test, feature = "test-support"))]
pub use transport::{FakeTransport, SentAlert};
