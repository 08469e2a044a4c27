// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline cache, outbox and inbound deduplication.

mod cache;
mod dedup;
mod engine;
mod outbox;

pub use cache::MemoryCache;
pub use dedup::DedupWindow;
pub use engine::{CacheStats, MessageSyncEngine, SyncSettings};
pub use outbox::{Outbox, OutboxItem};
