// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection management.
//!
//! [`ConnectionManager`] is a cheap handle to a background task that owns
//! the transport. The task runs one session at a time: connect, pump frames
//! and heartbeats while connected, then back off (and possibly fail over)
//! before the next attempt.
//!
//! Every session is stamped with an epoch. `connect()` and `disconnect()`
//! bump the epoch and cancel the session's token while holding the control
//! lock, so anything a stale session tries to do afterwards (state changes,
//! events, frame delivery) is rejected.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lx_core::protocol::{self, Decoded, InboundFrame, OutboundFrame};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::endpoint::EndpointRegistry;
use crate::events::{ClientEvent, EventBus};
use crate::heartbeat::{ConnectionQuality, HeartbeatAction, HeartbeatConfig, HeartbeatMonitor};
use crate::transport::{with_token, Transport, TransportFactory};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Retry budget exhausted; entered from `Reconnecting` and held until
    /// `connect()`.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives session lifecycle callbacks and decoded frames.
///
/// `on_connected` and `on_disconnected` run while the manager's control
/// lock is held; they must return quickly and must not call back into the
/// manager.
pub trait SessionHandler: Send + Sync {
    fn on_connected(&self);

    fn on_disconnected(&self);

    /// A decoded frame other than `pong` and `server_switch`.
    fn on_frame(&self, frame: InboundFrame);
}

/// Tunables for the connection task.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub token: String,
    pub backoff: Backoff,
    /// Scheduled retries allowed before entering `Failed`. Unbounded if None.
    pub max_attempts: Option<u32>,
    pub failover_threshold: u32,
    pub heartbeat: HeartbeatConfig,
    pub server_switch_delay: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        ConnectionSettings {
            token: config.token.clone(),
            backoff: Backoff::new(
                config.reconnect_initial_delay_ms,
                config.reconnect_max_delay_ms,
            ),
            max_attempts: config.reconnect_max_attempts,
            failover_threshold: config.failover_threshold,
            heartbeat: HeartbeatConfig {
                interval: config.heartbeat_interval(),
                timeout: config.heartbeat_timeout(),
                poor_threshold: config.poor_connection_threshold,
            },
            server_switch_delay: config.server_switch_delay(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            token: String::new(),
            backoff: Backoff::default(),
            max_attempts: None,
            failover_threshold: 2,
            heartbeat: HeartbeatConfig::default(),
            server_switch_delay: Duration::from_secs(2),
        }
    }
}

struct Control {
    state: ConnectionState,
    epoch: u64,
    cancel: CancellationToken,
}

/// State visible to both the handle and the background task.
struct Shared {
    control: Mutex<Control>,
    events: EventBus,
    handler: Arc<dyn SessionHandler>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `state` if `epoch` is still current. Returns false for a
    /// stale epoch.
    fn transition(&self, epoch: u64, state: ConnectionState) -> bool {
        let mut control = self.lock();
        if control.epoch != epoch {
            return false;
        }
        self.set_state(&mut control, state);
        true
    }

    fn set_state(&self, control: &mut Control, state: ConnectionState) {
        if control.state == state {
            return;
        }
        let previous = std::mem::replace(&mut control.state, state);
        debug!(from = %previous, to = %state, "connection state");
        self.events.emit(ClientEvent::StateChanged { state });
        if previous == ConnectionState::Connected {
            self.handler.on_disconnected();
        }
        if state == ConnectionState::Connected {
            self.handler.on_connected();
        }
    }

    fn emit(&self, epoch: u64, event: ClientEvent) -> bool {
        let control = self.lock();
        if control.epoch != epoch {
            return false;
        }
        self.events.emit(event);
        true
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }
}

/// Request for the task to start a new session.
struct Start {
    epoch: u64,
    cancel: CancellationToken,
}

/// Handle to the connection task.
///
/// Methods never block on the network; outcomes are reported on the event
/// bus.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
    start_tx: mpsc::UnboundedSender<Start>,
    registry: Arc<EndpointRegistry>,
}

impl ConnectionManager {
    /// Spawn the connection task. Must be called within a tokio runtime.
    pub fn spawn(
        settings: ConnectionSettings,
        registry: Arc<EndpointRegistry>,
        factory: TransportFactory,
        handler: Arc<dyn SessionHandler>,
        events: EventBus,
    ) -> Self {
        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                state: ConnectionState::Disconnected,
                epoch: 0,
                cancel: CancellationToken::new(),
            }),
            events,
            handler,
        });
        let (start_tx, start_rx) = mpsc::unbounded_channel();

        let runner = Runner {
            settings,
            registry: Arc::clone(&registry),
            factory,
            shared: Arc::clone(&shared),
        };
        tokio::spawn(runner.run(start_rx));

        ConnectionManager {
            shared,
            start_tx,
            registry,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Start connecting. No-op while connecting or connected.
    ///
    /// From `Reconnecting` or `Failed` the pending retry is abandoned and a
    /// fresh attempt starts immediately with a reset retry budget.
    pub fn connect(&self) {
        let start = {
            let mut control = self.shared.lock();
            if matches!(
                control.state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                debug!(state = %control.state, "connect ignored");
                return;
            }
            control.epoch += 1;
            control.cancel.cancel();
            control.cancel = CancellationToken::new();
            self.shared
                .set_state(&mut control, ConnectionState::Connecting);
            Start {
                epoch: control.epoch,
                cancel: control.cancel.clone(),
            }
        };
        if self.start_tx.send(start).is_err() {
            warn!("connection task is gone");
        }
    }

    /// Stop and stay stopped until the next `connect()`. Idempotent.
    pub fn disconnect(&self) {
        let mut control = self.shared.lock();
        control.epoch += 1;
        control.cancel.cancel();
        self.shared
            .set_state(&mut control, ConnectionState::Disconnected);
    }

    /// Drop the current connection and reconnect to the primary endpoint.
    pub fn reconnect_to_primary(&self) {
        self.disconnect();
        self.registry.switch_to_primary();
        self.connect();
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .finish()
    }
}

/// How one connection attempt ended.
#[derive(Debug)]
enum SessionEnd {
    /// Superseded by `connect()` or `disconnect()`.
    Cancelled,
    /// The transport never opened.
    Failed(String),
    /// The transport opened and later died.
    Lost(String),
    /// The server asked us to reconnect.
    ServerSwitch,
}

struct Runner {
    settings: ConnectionSettings,
    registry: Arc<EndpointRegistry>,
    factory: TransportFactory,
    shared: Arc<Shared>,
}

impl Runner {
    async fn run(self, mut start_rx: mpsc::UnboundedReceiver<Start>) {
        while let Some(start) = start_rx.recv().await {
            if start.cancel.is_cancelled() {
                continue;
            }
            self.run_session(start.epoch, start.cancel).await;
        }
        debug!("connection task exiting");
    }

    /// Connect, and keep reconnecting until cancelled or out of budget.
    async fn run_session(&self, epoch: u64, cancel: CancellationToken) {
        // Retries scheduled since the last successful open.
        let mut retries = 0u32;
        // Consecutive failed opens against the current endpoint.
        let mut endpoint_failures = 0u32;

        loop {
            if cancel.is_cancelled() || !self.shared.transition(epoch, ConnectionState::Connecting)
            {
                return;
            }

            let delay = match self.attempt(epoch, &cancel).await {
                SessionEnd::Cancelled => return,
                SessionEnd::ServerSwitch => {
                    info!(
                        delay_ms = self.settings.server_switch_delay.as_millis() as u64,
                        "server requested reconnect"
                    );
                    retries = 0;
                    endpoint_failures = 0;
                    self.settings.server_switch_delay
                }
                outcome => {
                    match outcome {
                        SessionEnd::Lost(reason) => {
                            warn!(%reason, "connection lost");
                            retries = 0;
                            endpoint_failures = 0;
                        }
                        SessionEnd::Failed(reason) => {
                            warn!(%reason, endpoint = %self.registry.current().name, "connect failed");
                            endpoint_failures += 1;
                            if endpoint_failures >= self.settings.failover_threshold {
                                self.fail_over(epoch, &mut endpoint_failures);
                            }
                        }
                        _ => {}
                    }

                    if let Some(max) = self.settings.max_attempts {
                        if retries >= max {
                            warn!(retries, "reconnect budget exhausted");
                            if self.shared.transition(epoch, ConnectionState::Reconnecting) {
                                self.shared.transition(epoch, ConnectionState::Failed);
                            }
                            return;
                        }
                    }
                    let delay = self.settings.backoff.delay_for_attempt(retries);
                    retries += 1;
                    delay
                }
            };

            if !self.shared.transition(epoch, ConnectionState::Reconnecting) {
                return;
            }
            self.shared.emit(
                epoch,
                ClientEvent::ReconnectScheduled {
                    attempt: retries,
                    delay_ms: delay.as_millis() as u64,
                },
            );

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn fail_over(&self, epoch: u64, endpoint_failures: &mut u32) {
        let from = self.registry.current().name;
        if self.registry.switch_next() {
            *endpoint_failures = 0;
            let to = self.registry.current().name;
            self.shared
                .emit(epoch, ClientEvent::EndpointSwitched { from, to });
        } else {
            debug!(endpoint = %from, "failover suppressed, retrying same endpoint");
        }
    }

    async fn attempt(&self, epoch: u64, cancel: &CancellationToken) -> SessionEnd {
        let endpoint = self.registry.current();
        let url = with_token(&endpoint.transport_url, &self.settings.token);
        let mut transport = (self.factory)();

        info!(endpoint = %endpoint.name, "connecting");
        let opened = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            result = transport.connect(&url) => result,
        };
        if let Err(e) = opened {
            return SessionEnd::Failed(e.to_string());
        }

        let end = self.pump(epoch, cancel, transport.as_mut()).await;
        let _ = transport.disconnect().await;
        end
    }

    /// Run an open connection until it ends.
    async fn pump(
        &self,
        epoch: u64,
        cancel: &CancellationToken,
        transport: &mut dyn Transport,
    ) -> SessionEnd {
        if !self.shared.transition(epoch, ConnectionState::Connected) {
            return SessionEnd::Cancelled;
        }
        info!(endpoint = %self.registry.current().name, "connected");

        let config = self.settings.heartbeat;
        let heartbeat_enabled = !config.interval.is_zero();
        let period = config.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = HeartbeatMonitor::new(config);
        heartbeat.start();

        let end = loop {
            let deadline = heartbeat.ping_deadline();

            tokio::select! {
                _ = cancel.cancelled() => break SessionEnd::Cancelled,

                received = transport.recv() => match received {
                    Ok(Some(text)) => {
                        if let Some(end) = self.dispatch(epoch, &text, &mut heartbeat) {
                            break end;
                        }
                    }
                    Ok(None) => break SessionEnd::Lost("closed by server".to_string()),
                    Err(e) => break SessionEnd::Lost(e.to_string()),
                },

                _ = ticker.tick(), if heartbeat_enabled => {
                    match heartbeat.on_interval(Instant::now()) {
                        Some(HeartbeatAction::SendPing) => {
                            if let Err(e) = transport.send(OutboundFrame::Ping).await {
                                break SessionEnd::Lost(e.to_string());
                            }
                        }
                        Some(HeartbeatAction::Dead) => break self.heartbeat_dead(epoch),
                        None => {}
                    }
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    debug!(
                        failures = heartbeat.record().consecutive_failures + 1,
                        "pong timed out"
                    );
                    if let Some(HeartbeatAction::Dead) = heartbeat.on_ping_timeout() {
                        break self.heartbeat_dead(epoch);
                    }
                }
            }
        };

        heartbeat.stop();
        end
    }

    fn heartbeat_dead(&self, epoch: u64) -> SessionEnd {
        self.shared.emit(
            epoch,
            ClientEvent::QualityChanged {
                quality: ConnectionQuality::Poor,
                latency_ms: None,
            },
        );
        SessionEnd::Lost("heartbeat timeout".to_string())
    }

    /// Route one inbound frame. Returns Some if the session must end.
    fn dispatch(
        &self,
        epoch: u64,
        text: &str,
        heartbeat: &mut HeartbeatMonitor,
    ) -> Option<SessionEnd> {
        match protocol::decode(text) {
            Ok(Decoded::Frame(InboundFrame::Pong)) => {
                if let Some((latency_ms, quality)) = heartbeat.on_pong(Instant::now()) {
                    debug!(latency_ms, %quality, "pong");
                    self.shared.emit(
                        epoch,
                        ClientEvent::QualityChanged {
                            quality,
                            latency_ms: Some(latency_ms),
                        },
                    );
                }
                None
            }
            Ok(Decoded::Frame(InboundFrame::ServerSwitch)) => Some(SessionEnd::ServerSwitch),
            Ok(Decoded::Frame(frame)) => {
                if self.shared.is_current(epoch) {
                    debug!(kind = frame.kind(), "frame");
                    self.shared.handler.on_frame(frame);
                }
                None
            }
            Ok(Decoded::Unknown(kind)) => {
                debug!(%kind, "ignoring unknown frame type");
                None
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
