// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::inbound_message;
use lx_core::MessageStatus;

#[test]
fn capacity_plus_one_evicts_oldest() {
    let mut cache = MemoryCache::new(100);
    for i in 1..=100 {
        assert_eq!(cache.put(inbound_message(&i.to_string(), "c1")), None);
    }
    assert_eq!(cache.put(inbound_message("101", "c1")), Some("1".to_string()));
    assert_eq!(cache.len(), 100);
    assert!(!cache.contains("1"));
    assert!(cache.contains("101"));
}

#[test]
fn get_refreshes_recency() {
    let mut cache = MemoryCache::new(2);
    cache.put(inbound_message("a", "c1"));
    cache.put(inbound_message("b", "c1"));
    assert!(cache.get("a").is_some());

    assert_eq!(cache.put(inbound_message("c", "c1")), Some("b".to_string()));
    assert!(cache.contains("a"));
}

#[test]
fn peek_does_not_refresh() {
    let mut cache = MemoryCache::new(2);
    cache.put(inbound_message("a", "c1"));
    cache.put(inbound_message("b", "c1"));
    assert!(cache.peek("a").is_some());
    assert_eq!(cache.put(inbound_message("c", "c1")), Some("a".to_string()));
}

#[test]
fn replacing_an_entry_does_not_grow() {
    let mut cache = MemoryCache::new(2);
    cache.put(inbound_message("a", "c1"));
    let mut updated = inbound_message("a", "c1");
    updated.status = MessageStatus::Read;
    cache.put(updated);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.peek("a").unwrap().status, MessageStatus::Read);
}

#[test]
fn update_and_remove() {
    let mut cache = MemoryCache::new(4);
    cache.put(inbound_message("a", "c1"));
    cache.put(inbound_message("b", "c2"));

    assert!(cache.update("a", |m| m.status = MessageStatus::Delivered));
    assert!(!cache.update("zz", |m| m.status = MessageStatus::Delivered));
    cache.update_conversation("c2", |m| m.status = MessageStatus::Read);

    assert_eq!(cache.peek("a").unwrap().status, MessageStatus::Delivered);
    assert_eq!(cache.peek("b").unwrap().status, MessageStatus::Read);
    assert!(cache.remove("a").is_some());
    assert!(cache.remove("a").is_none());
    assert_eq!(cache.len(), 1);
}

#[test]
fn retain_newer_respects_keep() {
    let mut cache = MemoryCache::new(4);
    let mut old = inbound_message("old", "c1");
    old.created_at = chrono::Utc::now() - chrono::Duration::days(30);
    let mut kept = inbound_message("kept", "c1");
    kept.created_at = old.created_at;
    cache.put(old);
    cache.put(kept);
    cache.put(inbound_message("new", "c1"));

    let cutoff = chrono::Utc::now() - chrono::Duration::days(7);
    assert_eq!(cache.retain_newer(cutoff, |id| id == "kept"), 1);
    assert!(!cache.contains("old"));
    assert!(cache.contains("kept"));
    assert!(cache.contains("new"));
}
