// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    device_id = { 16, 32 },
    encryption_key = { 32, 64 },
)]
fn token_hex_length(n_bytes: usize, expected_chars: usize) {
    let token = token_hex(n_bytes);
    assert_eq!(token.len(), expected_chars);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn tokens_are_unique() {
    assert_ne!(token_hex(16), token_hex(16));
}
