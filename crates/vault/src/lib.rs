// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pk-vault: the encrypted backup store.
//!
//! A backup is a filtered tar.gz of the source paths wrapped in an
//! AES-256-GCM envelope, recorded in the store with a SHA-256 checksum of
//! the ciphertext. Restore refuses anything whose checksum no longer
//! matches.

mod archive;
mod crypto;
mod engine;

pub use engine::{BackupEngine, EngineConfig, VaultError};
