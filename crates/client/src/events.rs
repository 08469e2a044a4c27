// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client event stream.
//!
//! Every observable outcome (state changes, received messages, delivery
//! results) is published on one broadcast bus. Emission never blocks;
//! subscribers that fall more than the buffer size behind observe
//! `RecvError::Lagged` and skip ahead.

use lx_core::protocol::{CallInvite, MessageRef, ReadReceipt};
use lx_core::{Message, MessageStatus};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::connection::ConnectionState;
use crate::heartbeat::ConnectionQuality;

/// Receiver half handed to subscribers.
pub type EventStream = broadcast::Receiver<ClientEvent>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    StateChanged {
        state: ConnectionState,
    },
    QualityChanged {
        quality: ConnectionQuality,
        latency_ms: Option<u64>,
    },
    ReconnectScheduled {
        attempt: u32,
        delay_ms: u64,
    },
    EndpointSwitched {
        from: String,
        to: String,
    },
    /// A new inbound message, after it was persisted.
    MessageReceived {
        message: Box<Message>,
    },
    /// An outgoing message entered the outbox.
    MessageQueued {
        correlation_id: String,
    },
    /// The server acknowledged an outgoing message.
    MessageSent {
        correlation_id: String,
        id: String,
        status: MessageStatus,
    },
    /// An outgoing message exhausted its retries or was rejected outright.
    MessageFailed {
        correlation_id: String,
        reason: String,
    },
    MessageStatusChanged {
        id: String,
        status: MessageStatus,
    },
    MessageRead(MessageRef),
    MessageRecalled(MessageRef),
    ReadReceipt(ReadReceipt),
    ConversationRead {
        conversation_id: String,
    },
    Presence {
        user_id: String,
        online: bool,
    },
    CallInvite(CallInvite),
    /// Outbox flush and offline fetch finished for a fresh connection.
    SyncCompleted {
        flushed: usize,
        fetched: usize,
    },
}

/// Cloneable handle to the broadcast bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        EventBus { tx }
    }

    pub fn subscribe(&self) -> EventStream {
        self.tx.subscribe()
    }

    /// Publish an event. Dropped silently when nobody is subscribed.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
