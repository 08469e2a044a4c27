// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-memory LRU tier in front of the message store.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use lx_core::Message;

#[derive(Debug)]
struct CacheEntry {
    message: Message,
    tick: u64,
}

/// Least-recently-used message cache keyed by message id.
///
/// Recency is a monotonically increasing tick; `order` maps ticks back to
/// ids so the oldest entry is found in logarithmic time.
#[derive(Debug)]
pub struct MemoryCache {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        MemoryCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a message and mark it most recently used.
    pub fn get(&mut self, id: &str) -> Option<Message> {
        let tick = self.bump();
        let entry = self.entries.get_mut(id)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, id.to_string());
        Some(entry.message.clone())
    }

    /// Look up a message without touching recency.
    pub fn peek(&self, id: &str) -> Option<&Message> {
        self.entries.get(id).map(|e| &e.message)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or replace a message, evicting the least recently used entry
    /// when over capacity. Returns the evicted id, if any.
    pub fn put(&mut self, message: Message) -> Option<String> {
        let tick = self.bump();
        let id = message.id.clone();
        if let Some(old) = self.entries.insert(id.clone(), CacheEntry { message, tick }) {
            self.order.remove(&old.tick);
        }
        self.order.insert(tick, id);

        if self.entries.len() <= self.capacity {
            return None;
        }
        let (_, evicted) = self.order.pop_first()?;
        self.entries.remove(&evicted);
        Some(evicted)
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let entry = self.entries.remove(id)?;
        self.order.remove(&entry.tick);
        Some(entry.message)
    }

    /// Apply `f` to a cached message in place. Returns false if absent.
    pub fn update<F: FnOnce(&mut Message)>(&mut self, id: &str, f: F) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                f(&mut entry.message);
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every cached message in a conversation.
    pub fn update_conversation<F: FnMut(&mut Message)>(&mut self, conversation_id: &str, mut f: F) {
        for entry in self.entries.values_mut() {
            if entry.message.conversation_id == conversation_id {
                f(&mut entry.message);
            }
        }
    }

    /// Drop entries created before `cutoff`, except ids for which `keep`
    /// returns true. Returns the number removed.
    pub fn retain_newer<F: Fn(&str) -> bool>(&mut self, cutoff: DateTime<Utc>, keep: F) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(id, e)| e.message.created_at < cutoff && !keep(id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        expired.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
