// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side correlation ids for locally originated messages.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::clock::{ClockSource, SystemClock};

/// Prefix marking an id as provisional (not yet assigned by the server).
pub const LOCAL_PREFIX: &str = "local-";

/// Generates correlation ids of the form `local-{16 hex chars}`.
///
/// The hash covers the sender, the creation instant, a per-generator seed and
/// a monotonically increasing sequence, so two sends in the same millisecond
/// still get distinct ids.
#[derive(Debug)]
pub struct IdGenerator {
    seed: u64,
    seq: AtomicU64,
}

impl IdGenerator {
    /// Create a generator with an explicit seed.
    pub fn new(seed: u64) -> Self {
        IdGenerator {
            seed,
            seq: AtomicU64::new(0),
        }
    }

    /// Generate the next correlation id.
    pub fn generate(&self, sender_id: &str, now_ms: u64) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let input = format!("{}:{}:{}:{}", sender_id, now_ms, self.seed, seq);
        let hash = Sha256::digest(input.as_bytes());
        format!("{}{}", LOCAL_PREFIX, hex::encode(&hash[..8]))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        let seed = u64::from(std::process::id()) ^ SystemClock.now_ms();
        Self::new(seed)
    }
}

/// Returns true if the id was generated locally and never acknowledged.
pub fn is_provisional(id: &str) -> bool {
    id.starts_with(LOCAL_PREFIX)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
