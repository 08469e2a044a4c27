// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Message synchronization engine.
//!
//! Owns the memory cache, the outbox and the dedup window, and writes
//! through to the persistent store. The connection manager feeds it decoded
//! frames and session transitions via [`SessionHandler`].
//!
//! Inbound processing order is dedup, persist, cache, notify. Outbound
//! messages are persisted as `pending` before they enter the outbox, and are
//! only attempted while a session is connected.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lx_core::protocol::{InboundFrame, ReadReceipt};
use lx_core::{ClockSource, IdGenerator, Message, MessageDraft, MessageStatus, MessageStore};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cache::MemoryCache;
use super::dedup::DedupWindow;
use super::outbox::{Outbox, OutboxItem};
use crate::api::{ApiError, MessageApi, SendMessageRequest};
use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::connection::SessionHandler;
use crate::error::Result;
use crate::events::{ClientEvent, EventBus};

/// Tunables for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub cache_capacity: usize,
    pub dedup_capacity: usize,
    pub dedup_horizon: Duration,
    /// Delivery attempts before an outgoing message is marked failed.
    pub outbox_max_attempts: u32,
    pub send_timeout: Duration,
    pub retry_backoff: Backoff,
}

impl SyncSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        SyncSettings {
            cache_capacity: config.memory_cache_capacity,
            dedup_capacity: config.dedup_capacity,
            dedup_horizon: config.dedup_horizon(),
            outbox_max_attempts: config.outbox_max_attempts,
            send_timeout: config.send_timeout(),
            retry_backoff: Backoff::new(
                config.reconnect_initial_delay_ms,
                config.reconnect_max_delay_ms,
            ),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            cache_capacity: 100,
            dedup_capacity: 1024,
            dedup_horizon: Duration::from_secs(600),
            outbox_max_attempts: 3,
            send_timeout: Duration::from_secs(10),
            retry_backoff: Backoff::default(),
        }
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_capacity: usize,
    pub outbox_len: usize,
    pub dedup_len: usize,
    pub stored_messages: usize,
}

#[derive(Debug, Default)]
struct Session {
    epoch: u64,
    connected: bool,
}

enum SendOutcome {
    Gone,
    Interrupted,
    Retry(Duration),
    Failed(String),
}

pub struct MessageSyncEngine {
    this: Weak<MessageSyncEngine>,
    settings: SyncSettings,
    store: Mutex<Box<dyn MessageStore>>,
    cache: Mutex<MemoryCache>,
    outbox: Mutex<Outbox>,
    dedup: Mutex<DedupWindow>,
    session: Mutex<Session>,
    api: Arc<dyn MessageApi>,
    events: EventBus,
    ids: IdGenerator,
    clock: Arc<dyn ClockSource>,
    runtime: Handle,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MessageSyncEngine {
    /// Background work (deliveries, post-connect sync) runs on `runtime`, so
    /// [`send`](Self::send) may be called from any thread.
    pub fn new(
        settings: SyncSettings,
        store: Box<dyn MessageStore>,
        api: Arc<dyn MessageApi>,
        events: EventBus,
        clock: Arc<dyn ClockSource>,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| MessageSyncEngine {
            this: this.clone(),
            cache: Mutex::new(MemoryCache::new(settings.cache_capacity)),
            dedup: Mutex::new(DedupWindow::new(
                settings.dedup_capacity,
                settings.dedup_horizon,
            )),
            settings,
            store: Mutex::new(store),
            outbox: Mutex::new(Outbox::new()),
            session: Mutex::new(Session::default()),
            api,
            events,
            ids: IdGenerator::default(),
            clock,
            runtime,
        })
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_ms() as i64).unwrap_or_else(Utc::now)
    }

    fn is_current(&self, epoch: u64) -> bool {
        let session = lock(&self.session);
        session.connected && session.epoch == epoch
    }

    fn connected_epoch(&self) -> Option<u64> {
        let session = lock(&self.session);
        session.connected.then_some(session.epoch)
    }

    /// Queue an outgoing message.
    ///
    /// A draft whose correlation id is already queued returns the existing
    /// item unchanged. Delivery starts immediately when connected.
    pub fn send(&self, draft: MessageDraft) -> Result<OutboxItem> {
        let correlation_id = match &draft.correlation_id {
            Some(id) => id.clone(),
            None => self.ids.generate(&draft.sender_id, self.clock.now_ms()),
        };
        let message = Message::from_draft(draft, correlation_id.clone(), self.now());
        let item = OutboxItem::new(message);

        {
            let mut outbox = lock(&self.outbox);
            if let Some(existing) = outbox.get(&correlation_id) {
                debug!(%correlation_id, "already queued");
                return Ok(existing.clone());
            }
            outbox.enqueue(item.clone());
        }

        if let Err(e) = lock(&self.store).insert(&item.message) {
            lock(&self.outbox).remove(&correlation_id);
            return Err(e.into());
        }
        lock(&self.cache).put(item.message.clone());

        debug!(%correlation_id, "message queued");
        self.events.emit(ClientEvent::MessageQueued {
            correlation_id: correlation_id.clone(),
        });

        if let Some(epoch) = self.connected_epoch() {
            self.spawn_delivery(correlation_id, epoch, Duration::ZERO);
        }
        Ok(item)
    }

    fn spawn_delivery(&self, correlation_id: String, epoch: u64, delay: Duration) {
        let this = self.this.clone();
        self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(engine) = this.upgrade() {
                if engine.is_current(epoch) {
                    engine.deliver(&correlation_id, epoch).await;
                }
            }
        });
    }

    /// Make one delivery attempt. Returns true if the message was acked.
    async fn deliver(&self, correlation_id: &str, epoch: u64) -> bool {
        let request = {
            let mut outbox = lock(&self.outbox);
            let Some(item) = outbox.get_mut(correlation_id) else {
                return false;
            };
            if item.in_flight {
                return false;
            }
            item.in_flight = true;
            item.next_attempt_at = None;
            SendMessageRequest::from(&item.message)
        };

        let sent = tokio::time::timeout(self.settings.send_timeout, self.api.send_message(request));
        let result = match sent.await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Network("send timed out".to_string())),
        };

        match result {
            Ok(ack) => self.on_ack(correlation_id, &ack.id, ack.status),
            Err(e) => {
                self.on_send_error(correlation_id, epoch, e);
                false
            }
        }
    }

    fn on_send_error(&self, correlation_id: &str, epoch: u64, error: ApiError) {
        let permanent = error.is_permanent();
        let current = self.is_current(epoch);

        let outcome = {
            let mut outbox = lock(&self.outbox);
            match outbox.get_mut(correlation_id) {
                None => SendOutcome::Gone,
                Some(item) => {
                    item.in_flight = false;
                    item.last_error = Some(error.to_string());
                    if !current && !permanent {
                        SendOutcome::Interrupted
                    } else {
                        item.attempt_count += 1;
                        if permanent || item.attempt_count >= self.settings.outbox_max_attempts {
                            outbox.remove(correlation_id);
                            SendOutcome::Failed(error.to_string())
                        } else {
                            let delay = self
                                .settings
                                .retry_backoff
                                .delay_for_attempt(item.attempt_count - 1);
                            item.next_attempt_at = Some(Instant::now() + delay);
                            SendOutcome::Retry(delay)
                        }
                    }
                }
            }
        };

        match outcome {
            SendOutcome::Gone => {}
            SendOutcome::Interrupted => {
                debug!(%correlation_id, error = %error, "send interrupted by session change");
                // The flush for the new session may have skipped this item
                // while it was in flight.
                if let Some(epoch) = self.connected_epoch() {
                    self.spawn_delivery(correlation_id.to_string(), epoch, Duration::ZERO);
                }
            }
            SendOutcome::Retry(delay) => {
                warn!(%correlation_id, error = %error, delay_ms = delay.as_millis() as u64, "send failed, will retry");
                self.spawn_delivery(correlation_id.to_string(), epoch, delay);
            }
            SendOutcome::Failed(reason) => {
                warn!(%correlation_id, %reason, "giving up on message");
                self.mark_failed(correlation_id, reason);
            }
        }
    }

    fn mark_failed(&self, correlation_id: &str, reason: String) {
        let at = self.now();
        if let Err(e) = lock(&self.store).update_status(correlation_id, MessageStatus::Failed, at) {
            warn!(%correlation_id, error = %e, "failed to persist failed status");
        }
        lock(&self.cache).update(correlation_id, |m| {
            m.advance_status(MessageStatus::Failed, at);
        });
        self.events.emit(ClientEvent::MessageFailed {
            correlation_id: correlation_id.to_string(),
            reason,
        });
    }

    /// Apply a server acknowledgement.
    ///
    /// Returns false if nothing with `correlation_id` was waiting.
    pub fn on_ack(&self, correlation_id: &str, server_id: &str, status: MessageStatus) -> bool {
        let Some(item) = lock(&self.outbox).remove(correlation_id) else {
            debug!(%correlation_id, "ack for unknown message");
            return false;
        };
        let status = match status {
            MessageStatus::Pending | MessageStatus::Failed => MessageStatus::Sent,
            other => other,
        };
        let at = self.now();

        if let Err(e) = lock(&self.store).rewrite_id(correlation_id, server_id, status, at) {
            warn!(%correlation_id, %server_id, error = %e, "failed to persist ack");
        }

        {
            let mut cache = lock(&self.cache);
            let provisional = cache.remove(correlation_id);
            let merged = cache.update(server_id, |m| {
                m.correlation_id.get_or_insert_with(|| correlation_id.to_string());
                m.advance_status(status, at);
            });
            if !merged {
                let mut message = provisional.unwrap_or(item.message);
                message.id = server_id.to_string();
                message.status = status;
                message.updated_at = at;
                cache.put(message);
            }
        }

        // The server may echo the message back; it is already known.
        lock(&self.dedup).insert(server_id, Instant::now());

        info!(%correlation_id, %server_id, %status, "message sent");
        self.events.emit(ClientEvent::MessageSent {
            correlation_id: correlation_id.to_string(),
            id: server_id.to_string(),
            status,
        });
        true
    }

    /// Process an inbound message. Returns false for a duplicate.
    pub fn on_inbound(&self, message: Message) -> bool {
        if !lock(&self.dedup).insert(&message.id, Instant::now()) {
            debug!(id = %message.id, "duplicate message dropped");
            return false;
        }

        let message = self.persist_inbound(message);
        lock(&self.cache).put(message.clone());
        self.events.emit(ClientEvent::MessageReceived {
            message: Box::new(message),
        });
        true
    }

    /// Upsert an inbound message without regressing a stored status.
    /// Returns the merged message.
    fn persist_inbound(&self, mut message: Message) -> Message {
        {
            let mut store = lock(&self.store);
            match store.get(&message.id) {
                Ok(Some(existing)) => {
                    if existing.status != message.status
                        && !existing.status.can_advance_to(message.status)
                    {
                        message.status = existing.status;
                    }
                    if message.correlation_id.is_none() {
                        message.correlation_id = existing.correlation_id;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(id = %message.id, error = %e, "failed to read stored message"),
            }
            if let Err(e) = store.insert(&message) {
                warn!(id = %message.id, error = %e, "failed to persist inbound message");
            }
        }
        message
    }

    /// Move a known message forward to `status`. Returns true if either
    /// tier changed.
    pub fn apply_status(&self, id: &str, status: MessageStatus) -> bool {
        let at = self.now();
        let stored = {
            let mut store = lock(&self.store);
            match store.get(id) {
                Ok(Some(existing)) if existing.status.can_advance_to(status) => {
                    store.update_status(id, status, at).unwrap_or_else(|e| {
                        warn!(%id, error = %e, "failed to persist status");
                        false
                    })
                }
                Ok(_) => false,
                Err(e) => {
                    warn!(%id, error = %e, "failed to read stored message");
                    false
                }
            }
        };
        let mut cached = false;
        lock(&self.cache).update(id, |m| cached = m.advance_status(status, at));
        stored || cached
    }

    fn apply_read_receipt(&self, receipt: &ReadReceipt) {
        let at = receipt.read_at.unwrap_or_else(|| self.now());
        self.mark_read_locally(&receipt.conversation_id, &receipt.reader_id, at);
    }

    fn mark_read_locally(&self, conversation_id: &str, reader_id: &str, at: DateTime<Utc>) -> usize {
        let changed = lock(&self.store)
            .mark_conversation_read(conversation_id, reader_id, at)
            .unwrap_or_else(|e| {
                warn!(%conversation_id, error = %e, "failed to persist read state");
                0
            });
        lock(&self.cache).update_conversation(conversation_id, |m| {
            if m.receiver_id == reader_id
                && matches!(m.status, MessageStatus::Sent | MessageStatus::Delivered)
            {
                m.advance_status(MessageStatus::Read, at);
            }
        });
        changed
    }

    /// Route a decoded frame.
    pub fn handle_frame(&self, frame: InboundFrame) {
        match frame {
            InboundFrame::NewMessage(message) => {
                self.on_inbound(*message);
            }
            InboundFrame::MessageRead(r) => {
                self.apply_status(&r.message_id, MessageStatus::Read);
                self.events.emit(ClientEvent::MessageRead(r));
            }
            InboundFrame::MessageRecalled(r) => {
                self.apply_status(&r.message_id, MessageStatus::Recalled);
                self.events.emit(ClientEvent::MessageRecalled(r));
            }
            InboundFrame::ReadReceipt(receipt) => {
                self.apply_read_receipt(&receipt);
                self.events.emit(ClientEvent::ReadReceipt(receipt));
            }
            InboundFrame::MessageStatus(update) => {
                if let Some(correlation_id) = &update.correlation_id {
                    if self.on_ack(correlation_id, &update.message_id, update.status) {
                        return;
                    }
                }
                if self.apply_status(&update.message_id, update.status) {
                    self.events.emit(ClientEvent::MessageStatusChanged {
                        id: update.message_id,
                        status: update.status,
                    });
                }
            }
            InboundFrame::Presence { user_id, online } => {
                self.events.emit(ClientEvent::Presence { user_id, online });
            }
            InboundFrame::CallInvite(invite) => {
                self.events.emit(ClientEvent::CallInvite(invite));
            }
            InboundFrame::Pong | InboundFrame::ServerSwitch => {}
        }
    }

    /// Attempt every queued message once, in insertion order.
    ///
    /// Items already at the attempt ceiling are failed instead. Returns the
    /// number of messages acknowledged.
    pub async fn flush_outbox(&self, epoch: u64) -> usize {
        let ids = lock(&self.outbox).ids();
        let mut acked = 0;
        for correlation_id in ids {
            if !self.is_current(epoch) {
                break;
            }
            let exhausted = {
                let mut outbox = lock(&self.outbox);
                match outbox.get(&correlation_id) {
                    Some(item) if item.attempt_count >= self.settings.outbox_max_attempts => {
                        let reason = item
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "retry limit reached".to_string());
                        outbox.remove(&correlation_id);
                        Some(reason)
                    }
                    _ => None,
                }
            };
            if let Some(reason) = exhausted {
                self.mark_failed(&correlation_id, reason);
                continue;
            }
            if self.deliver(&correlation_id, epoch).await {
                acked += 1;
            }
        }
        acked
    }

    /// Fetch messages buffered by the server while we were away.
    ///
    /// Returns the number of new messages applied.
    pub async fn reconcile_offline_messages(&self) -> Result<usize> {
        let messages = self.fetch_offline().await?;
        Ok(self.apply_offline(messages))
    }

    async fn fetch_offline(&self) -> Result<Vec<Message>> {
        let fetched = tokio::time::timeout(self.settings.send_timeout, self.api.get_offline_messages());
        let batch = match fetched.await {
            Ok(result) => result?,
            Err(_) => return Err(ApiError::Network("offline fetch timed out".to_string()).into()),
        };
        if batch.skipped > 0 {
            warn!(skipped = batch.skipped, "some offline messages could not be parsed");
        }
        Ok(batch.messages)
    }

    fn apply_offline(&self, messages: Vec<Message>) -> usize {
        let mut applied = 0;
        for message in messages {
            if self.on_inbound(message) {
                applied += 1;
            }
        }
        applied
    }

    async fn sync_after_connect(&self, epoch: u64) {
        let flushed = self.flush_outbox(epoch).await;
        if !self.is_current(epoch) {
            return;
        }
        let fetched = match self.fetch_offline().await {
            Ok(messages) if self.is_current(epoch) => self.apply_offline(messages),
            Ok(messages) => {
                // Session ended mid-fetch: keep the rows, but leave them out
                // of the dedup window so the next session reports them.
                debug!(count = messages.len(), "storing offline batch from ended session");
                for message in messages {
                    self.persist_inbound(message);
                }
                return;
            }
            Err(e) => {
                warn!(error = %e, "offline fetch failed");
                0
            }
        };
        if self.is_current(epoch) {
            info!(flushed, fetched, "sync completed");
            self.events
                .emit(ClientEvent::SyncCompleted { flushed, fetched });
        }
    }

    /// Reload messages persisted as pending into the outbox.
    pub fn restore_outbox(&self) -> Result<usize> {
        let pending = lock(&self.store).pending()?;
        let mut restored = 0;
        for message in pending {
            let cached = message.clone();
            if lock(&self.outbox).enqueue(OutboxItem::new(message)) {
                lock(&self.cache).put(cached);
                restored += 1;
            }
        }
        if restored > 0 {
            info!(restored, "restored pending messages");
        }
        Ok(restored)
    }

    /// Drop messages older than `retention` from both tiers. Queued messages
    /// are kept. Returns the number of rows deleted.
    pub fn evict_expired(&self, retention: chrono::Duration) -> Result<usize> {
        let cutoff = self.now() - retention;
        let deleted = lock(&self.store).delete_older_than(cutoff)?;
        let queued: HashSet<String> = lock(&self.outbox).ids().into_iter().collect();
        let evicted = lock(&self.cache).retain_newer(cutoff, |id| queued.contains(id));
        debug!(deleted, evicted, "evicted expired messages");
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let stored_messages = lock(&self.store).count()?;
        let (memory_entries, memory_capacity) = {
            let cache = lock(&self.cache);
            (cache.len(), cache.capacity())
        };
        Ok(CacheStats {
            memory_entries,
            memory_capacity,
            outbox_len: lock(&self.outbox).len(),
            dedup_len: lock(&self.dedup).len(),
            stored_messages,
        })
    }

    pub fn clear_memory_cache(&self) {
        lock(&self.cache).clear();
    }

    /// Drop everything: both cache tiers, the dedup window and the outbox.
    pub fn clear_all(&self) -> Result<()> {
        lock(&self.outbox).clear();
        lock(&self.cache).clear();
        lock(&self.dedup).clear();
        lock(&self.store).clear()?;
        Ok(())
    }

    /// Look a message up, falling back to the store on a cache miss.
    pub fn cached_message(&self, id: &str) -> Result<Option<Message>> {
        if let Some(message) = lock(&self.cache).get(id) {
            return Ok(Some(message));
        }
        let stored = lock(&self.store).get(id)?;
        if let Some(message) = &stored {
            lock(&self.cache).put(message.clone());
        }
        Ok(stored)
    }

    /// Stored messages in a conversation, newest first.
    pub fn conversation_messages(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        Ok(lock(&self.store).query_by_conversation(conversation_id, limit, offset)?)
    }

    /// Tell the server a conversation was read, then mark it locally.
    pub async fn mark_as_read(&self, conversation_id: &str, reader_id: &str) -> Result<usize> {
        self.api.mark_as_read(conversation_id).await?;
        let changed = self.mark_read_locally(conversation_id, reader_id, self.now());
        self.events.emit(ClientEvent::ConversationRead {
            conversation_id: conversation_id.to_string(),
        });
        Ok(changed)
    }

    /// Recall a sent message, then mark it recalled locally.
    pub async fn recall_message(&self, message_id: &str) -> Result<()> {
        self.api.recall_message(message_id).await?;
        if self.apply_status(message_id, MessageStatus::Recalled) {
            self.events.emit(ClientEvent::MessageStatusChanged {
                id: message_id.to_string(),
                status: MessageStatus::Recalled,
            });
        }
        Ok(())
    }

    /// Snapshot of a queued item.
    pub fn outbox_item(&self, correlation_id: &str) -> Option<OutboxItem> {
        lock(&self.outbox).get(correlation_id).cloned()
    }
}

impl SessionHandler for MessageSyncEngine {
    fn on_connected(&self) {
        let epoch = {
            let mut session = lock(&self.session);
            session.epoch += 1;
            session.connected = true;
            session.epoch
        };
        let this = self.this.clone();
        self.runtime.spawn(async move {
            if let Some(engine) = this.upgrade() {
                engine.sync_after_connect(epoch).await;
            }
        });
    }

    fn on_disconnected(&self) {
        let mut session = lock(&self.session);
        session.epoch += 1;
        session.connected = false;
    }

    fn on_frame(&self, frame: InboundFrame) {
        self.handle_frame(frame);
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
