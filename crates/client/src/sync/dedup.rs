// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Window of recently seen inbound message ids.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

/// Bounded ring of seen ids.
///
/// An id is forgotten once it is older than the horizon or pushed out by
/// newer ids when the ring is full.
#[derive(Debug)]
pub struct DedupWindow {
    capacity: usize,
    horizon: Duration,
    ring: VecDeque<(String, Instant)>,
    seen: HashSet<String>,
}

impl DedupWindow {
    pub fn new(capacity: usize, horizon: Duration) -> Self {
        DedupWindow {
            capacity: capacity.max(1),
            horizon,
            ring: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn contains(&mut self, id: &str, now: Instant) -> bool {
        self.expire(now);
        self.seen.contains(id)
    }

    /// Record `id`. Returns true if it was not seen within the window.
    pub fn insert(&mut self, id: &str, now: Instant) -> bool {
        self.expire(now);
        if self.seen.contains(id) {
            return false;
        }
        if self.ring.len() >= self.capacity {
            if let Some((oldest, _)) = self.ring.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.ring.push_back((id.to_string(), now));
        self.seen.insert(id.to_string());
        true
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.seen.clear();
    }

    fn expire(&mut self, now: Instant) {
        while let Some((id, at)) = self.ring.front() {
            if now.saturating_duration_since(*at) < self.horizon {
                break;
            }
            self.seen.remove(id);
            self.ring.pop_front();
        }
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
