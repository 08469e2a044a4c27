// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Public client facade.
//!
//! [`ImClient`] wires the endpoint registry, connection manager and sync
//! engine together and exposes one event stream. Build it with
//! [`ClientBuilder`]; every collaborator can be swapped for tests.

use std::sync::{Arc, Weak};
use std::time::Duration;

use lx_core::{ClockSource, Message, MessageDraft, MessageStore, SqliteStore, SystemClock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{HttpMessageApi, MessageApi};
use crate::config::{ClientConfig, Endpoint};
use crate::connection::{ConnectionManager, ConnectionSettings, ConnectionState, SessionHandler};
use crate::endpoint::{EndpointRegistry, SelectionPersistence};
use crate::error::{Error, Result};
use crate::events::{EventBus, EventStream};
use crate::sync::{CacheStats, MessageSyncEngine, OutboxItem, SyncSettings};
use crate::transport::{websocket_factory, TransportFactory};

/// Message database file name inside the state directory.
pub const DB_FILE_NAME: &str = "messages.db";

/// Assembles an [`ImClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    store: Option<Box<dyn MessageStore>>,
    api: Option<Arc<dyn MessageApi>>,
    transport: Option<TransportFactory>,
    clock: Option<Arc<dyn ClockSource>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder {
            config,
            store: None,
            api: None,
            transport: None,
            clock: None,
        }
    }

    /// Use `store` instead of the SQLite database in the state directory.
    pub fn store(mut self, store: impl MessageStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn api(mut self, api: Arc<dyn MessageApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn transport(mut self, factory: TransportFactory) -> Self {
        self.transport = Some(factory);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the config, open storage and start background tasks.
    ///
    /// Must be called within a tokio runtime; its methods can then be used
    /// from any thread. The client starts disconnected; call
    /// [`ImClient::connect`].
    pub fn build(self) -> Result<ImClient> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let state_dir = config.state_dir();

        let mut registry = EndpointRegistry::new(
            config.endpoints.clone(),
            config.switch_cooldown_ms,
            Arc::clone(&clock),
        )?;
        if let Some(dir) = &state_dir {
            registry = registry.with_persistence(SelectionPersistence::new(dir));
        }
        let registry = Arc::new(registry);

        let store = match self.store {
            Some(store) => store,
            None => {
                let dir = state_dir.as_ref().ok_or(Error::NoStateDir)?;
                let path = dir.join(DB_FILE_NAME);
                debug!(path = %path.display(), "opening message store");
                Box::new(SqliteStore::open(&path)?)
            }
        };
        let api = self.api.unwrap_or_else(|| {
            Arc::new(HttpMessageApi::new(
                Arc::clone(&registry),
                config.token.clone(),
            ))
        });
        let transport = self.transport.unwrap_or_else(websocket_factory);

        let events = EventBus::new(config.event_buffer);
        let engine = MessageSyncEngine::new(
            SyncSettings::from_config(&config),
            store,
            api,
            events.clone(),
            clock,
            runtime,
        );
        engine.restore_outbox()?;

        let connection = ConnectionManager::spawn(
            ConnectionSettings::from_config(&config),
            Arc::clone(&registry),
            transport,
            Arc::clone(&engine) as Arc<dyn SessionHandler>,
            events.clone(),
        );

        let maintenance = CancellationToken::new();
        spawn_maintenance(
            Arc::downgrade(&engine),
            Duration::from_secs(config.maintenance_interval_secs),
            config.retention(),
            maintenance.clone(),
        );

        info!(
            endpoint = %registry.current().name,
            endpoints = registry.endpoints().len(),
            "client ready"
        );
        Ok(ImClient {
            config,
            registry,
            connection,
            engine,
            events,
            maintenance,
        })
    }
}

/// Periodically evict expired messages until cancelled.
fn spawn_maintenance(
    engine: Weak<MessageSyncEngine>,
    period: Duration,
    retention: chrono::Duration,
    cancel: CancellationToken,
) {
    if period.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(engine) = engine.upgrade() else { break };
                    match engine.evict_expired(retention) {
                        Ok(0) => {}
                        Ok(deleted) => info!(deleted, "evicted expired messages"),
                        Err(e) => warn!(error = %e, "maintenance failed"),
                    }
                }
            }
        }
    });
}

/// The messaging client.
///
/// Dropping it disconnects and stops background maintenance.
pub struct ImClient {
    config: ClientConfig,
    registry: Arc<EndpointRegistry>,
    connection: ConnectionManager,
    engine: Arc<MessageSyncEngine>,
    events: EventBus,
    maintenance: CancellationToken,
}

impl ImClient {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start connecting. Progress is reported on the event stream.
    pub fn connect(&self) {
        self.connection.connect();
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn reconnect_to_primary(&self) {
        self.connection.reconnect_to_primary();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn current_endpoint(&self) -> Endpoint {
        self.registry.current()
    }

    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Queue a message for delivery. Never waits on the network.
    pub fn send(&self, draft: MessageDraft) -> Result<OutboxItem> {
        self.engine.send(draft)
    }

    pub async fn mark_as_read(&self, conversation_id: &str, reader_id: &str) -> Result<usize> {
        self.engine.mark_as_read(conversation_id, reader_id).await
    }

    pub async fn recall_message(&self, message_id: &str) -> Result<()> {
        self.engine.recall_message(message_id).await
    }

    pub fn cached_message(&self, id: &str) -> Result<Option<Message>> {
        self.engine.cached_message(id)
    }

    pub fn conversation_messages(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        self.engine
            .conversation_messages(conversation_id, limit, offset)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        self.engine.stats()
    }

    /// Run retention eviction now with the configured window.
    pub fn evict_expired(&self) -> Result<usize> {
        self.engine.evict_expired(self.config.retention())
    }

    pub fn clear_memory_cache(&self) {
        self.engine.clear_memory_cache();
    }

    pub fn clear_all(&self) -> Result<()> {
        self.engine.clear_all()
    }
}

impl Drop for ImClient {
    fn drop(&mut self) {
        self.maintenance.cancel();
        self.connection.disconnect();
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
