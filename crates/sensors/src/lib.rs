// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pk-sensors: host observation adapters.
//!
//! Everything the agent learns about the machine comes through here: the
//! metrics snapshot, the filesystem event stream and the process table.
//! Each source sits behind a small trait so the subsystems that consume
//! them are testable without a live host.

mod fs_events;
mod host;

pub use fs_events::{watch, FsEvent, FsEventKind, FsWatch};
pub use host::{DiskUsage, HostMonitor, HostSnapshot, NetworkCounters, ProcessInfo, SysinfoHost};

#[cfg(any(test, feature = "test-support"))]
pub use host::FakeHost;

use thiserror::Error;

/// Sensor errors
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("filesystem watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("host probe failed: {0}")]
    Probe(String),
}
