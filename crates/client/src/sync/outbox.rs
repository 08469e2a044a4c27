// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-send queue.

use lx_core::Message;
use serde::Serialize;
use tokio::time::Instant;

/// A locally originated message awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboxItem {
    pub message: Message,
    /// Delivery attempts made while connected.
    pub attempt_count: u32,
    #[serde(skip)]
    pub next_attempt_at: Option<Instant>,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub in_flight: bool,
}

impl OutboxItem {
    pub fn new(message: Message) -> Self {
        OutboxItem {
            message,
            attempt_count: 0,
            next_attempt_at: None,
            last_error: None,
            in_flight: false,
        }
    }

    /// The correlation id keying this item.
    pub fn correlation_id(&self) -> &str {
        self.message
            .correlation_id
            .as_deref()
            .unwrap_or(self.message.id.as_str())
    }
}

/// Insertion-ordered outbox holding at most one item per correlation id.
#[derive(Debug, Default)]
pub struct Outbox {
    items: Vec<OutboxItem>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.position(correlation_id).is_some()
    }

    /// Append an item. Returns false, leaving the existing item in place, if
    /// the correlation id is already queued.
    pub fn enqueue(&mut self, item: OutboxItem) -> bool {
        if self.contains(item.correlation_id()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn get(&self, correlation_id: &str) -> Option<&OutboxItem> {
        self.position(correlation_id).map(|i| &self.items[i])
    }

    pub fn get_mut(&mut self, correlation_id: &str) -> Option<&mut OutboxItem> {
        self.position(correlation_id).map(|i| &mut self.items[i])
    }

    pub fn remove(&mut self, correlation_id: &str) -> Option<OutboxItem> {
        self.position(correlation_id).map(|i| self.items.remove(i))
    }

    /// Correlation ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|i| i.correlation_id().to_string())
            .collect()
    }

    pub fn items(&self) -> &[OutboxItem] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn position(&self, correlation_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.correlation_id() == correlation_id)
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
