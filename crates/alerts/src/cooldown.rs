// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooldown-based alert deduplication

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pk_core::Clock;

/// Tracks the last emission per dedup key.
///
/// Scratch state: losing it on restart at worst re-sends one alert per key.
pub struct CooldownTracker<C: Clock> {
    cooldown: Duration,
    last: HashMap<String, Instant>,
    clock: C,
}

impl<C: Clock> CooldownTracker<C> {
    pub fn new(cooldown: Duration, clock: C) -> Self {
        Self {
            cooldown,
            last: HashMap::new(),
            clock,
        }
    }

    /// Whether an alert for `key` may go out now. Records the emission time
    /// when it may, so the next call within the cooldown answers no.
    pub fn should_send(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        if let Some(last) = self.last.get(key) {
            if now.duration_since(*last) < self.cooldown {
                return false;
            }
        }
        self.last.insert(key.to_string(), now);
        true
    }
}

#[cfg(test)]
#[path = "cooldown_tests.rs"]
mod tests;
