// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff shared by reconnection and outbox retries.

use std::time::Duration;

/// `delay = min(initial * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Backoff { initial_ms, max_ms }
    }

    pub fn initial_ms(&self) -> u64 {
        self.initial_ms
    }

    pub fn max_ms(&self) -> u64 {
        self.max_ms
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let calculated = self.initial_ms.saturating_mul(factor);
        Duration::from_millis(calculated.min(self.max_ms))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(1_000, 60_000)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
