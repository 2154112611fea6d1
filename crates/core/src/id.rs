// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Random token generation for device ids and secrets

use rand::RngCore;

/// Generate a lowercase hex token from `n_bytes` of OS randomness.
///
/// A 16-byte token yields the 32-hex stable device id; a 32-byte token
/// yields the backup encryption key.
pub fn token_hex(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
