// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fixtures and mocks shared by the client's unit tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use lx_core::protocol::OutboundFrame;
use lx_core::{ManualClock, Message, MessageDraft, MessageStatus};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::api::{ApiError, ApiFuture, ApiResult, MessageApi, OfflineBatch, SendAck, SendMessageRequest};
use crate::config::Endpoint;
use crate::endpoint::EndpointRegistry;
use crate::events::{ClientEvent, EventStream};
use crate::transport::{Transport, TransportError, TransportFactory, TransportFuture};

/// A message as the server would deliver it.
pub fn inbound_message(id: &str, conversation_id: &str) -> Message {
    let now = Utc::now();
    Message {
        id: id.to_string(),
        correlation_id: None,
        conversation_id: conversation_id.to_string(),
        sender_id: "bob".to_string(),
        receiver_id: "alice".to_string(),
        content: format!("message {id}"),
        message_type: Default::default(),
        file_url: None,
        file_size: None,
        duration: None,
        status: MessageStatus::Sent,
        created_at: now,
        updated_at: now,
    }
}

/// A pending outgoing message keyed by `correlation_id`.
pub fn outgoing_message(correlation_id: &str) -> Message {
    let draft = MessageDraft::text("c1", "alice", "bob", "hello");
    Message::from_draft(draft, correlation_id.to_string(), Utc::now())
}

pub fn endpoint(name: &str) -> Endpoint {
    Endpoint {
        name: name.to_string(),
        transport_url: format!("ws://{name}.test/ws"),
        api_url: format!("http://{name}.test/api/v1"),
        is_primary: name == "a",
    }
}

/// Registry over endpoints named `names`, with no failover cooldown.
pub fn registry(names: &[&str]) -> Arc<EndpointRegistry> {
    let endpoints = names.iter().map(|n| endpoint(n)).collect();
    Arc::new(EndpointRegistry::new(endpoints, 0, Arc::new(ManualClock::new(0))).unwrap())
}

/// Wait for the first event matching `pred`, skipping others.
pub async fn next_matching<F>(events: &mut EventStream, mut pred: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), wait)
        .await
        .expect("timed out waiting for event")
}

/// Collect every event already buffered on the stream.
pub fn drain(events: &mut EventStream) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[derive(Default)]
struct ServerState {
    fail_next: u32,
    fail_all: bool,
    auto_pong: bool,
    attempts: Vec<String>,
    sent: Vec<OutboundFrame>,
    link: Option<mpsc::UnboundedSender<Option<String>>>,
}

/// In-process stand-in for the realtime server.
///
/// Transports built by [`MockServer::factory`] share its state. The most
/// recently opened connection is the one `push` and `close` act on.
#[derive(Clone)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    /// A server that answers pings.
    pub fn new() -> Self {
        MockServer {
            state: Arc::new(Mutex::new(ServerState {
                auto_pong: true,
                ..Default::default()
            })),
        }
    }

    /// A server that never answers pings.
    pub fn silent() -> Self {
        let server = MockServer::new();
        server.state.lock().unwrap().auto_pong = false;
        server
    }

    pub fn factory(&self) -> TransportFactory {
        let state = Arc::clone(&self.state);
        Arc::new(move || -> Box<dyn Transport> {
            Box::new(MockTransport {
                state: Arc::clone(&state),
                link: None,
                rx: None,
            })
        })
    }

    pub fn fail_next_connects(&self, n: u32) {
        self.state.lock().unwrap().fail_next = n;
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    /// URLs of every connect attempt, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn ping_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .sent
            .iter()
            .filter(|f| matches!(f, OutboundFrame::Ping))
            .count()
    }

    /// Deliver a text frame on the live connection.
    pub fn push(&self, text: &str) {
        let state = self.state.lock().unwrap();
        let link = state.link.as_ref().expect("no live connection");
        let _ = link.send(Some(text.to_string()));
    }

    /// Close the live connection from the server side.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(link) = state.link.take() {
            let _ = link.send(None);
        }
    }
}

pub struct MockTransport {
    state: Arc<Mutex<ServerState>>,
    link: Option<mpsc::UnboundedSender<Option<String>>>,
    rx: Option<mpsc::UnboundedReceiver<Option<String>>>,
}

impl Transport for MockTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.attempts.push(url);
            if state.fail_all {
                return Err(TransportError::ConnectionFailed("refused".into()));
            }
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(TransportError::ConnectionFailed("refused".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            state.link = Some(tx.clone());
            self.link = Some(tx);
            self.rx = Some(rx);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.link = None;
            self.rx = None;
            Ok(())
        })
    }

    fn send(&mut self, frame: OutboundFrame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let link = self.link.as_ref().ok_or(TransportError::ConnectionClosed)?;
            let mut state = self.state.lock().unwrap();
            if state.auto_pong && frame == OutboundFrame::Ping {
                let _ = link.send(Some(r#"{"type":"pong"}"#.to_string()));
            }
            state.sent.push(frame);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<String>> {
        Box::pin(async move {
            let rx = self.rx.as_mut().ok_or(TransportError::ConnectionClosed)?;
            match rx.recv().await {
                Some(Some(text)) => Ok(Some(text)),
                Some(None) | None => Ok(None),
            }
        })
    }
}

#[derive(Default)]
struct ApiState {
    send_results: VecDeque<ApiResult<SendAck>>,
    hang_sends: bool,
    next_id: u64,
    requests: Vec<SendMessageRequest>,
    offline: Vec<Message>,
    offline_error: Option<ApiError>,
    offline_delay: Duration,
    read_calls: Vec<String>,
    recall_calls: Vec<String>,
    recall_error: Option<ApiError>,
}

/// Scriptable [`MessageApi`].
///
/// Unscripted sends succeed with ids `srv-1`, `srv-2`, and so on.
#[derive(Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<ApiState>>,
}

impl MockApi {
    pub fn new() -> Self {
        MockApi::default()
    }

    /// Queue the result of the next unscripted send.
    pub fn script_send(&self, result: ApiResult<SendAck>) {
        self.state.lock().unwrap().send_results.push_back(result);
    }

    /// Make every send hang forever.
    pub fn hang_sends(&self, hang: bool) {
        self.state.lock().unwrap().hang_sends = hang;
    }

    pub fn set_offline(&self, messages: Vec<Message>) {
        self.state.lock().unwrap().offline = messages;
    }

    /// Make offline fetches take `delay` before answering.
    pub fn delay_offline(&self, delay: Duration) {
        self.state.lock().unwrap().offline_delay = delay;
    }

    pub fn fail_offline(&self, error: ApiError) {
        self.state.lock().unwrap().offline_error = Some(error);
    }

    pub fn fail_recall(&self, error: ApiError) {
        self.state.lock().unwrap().recall_error = Some(error);
    }

    pub fn requests(&self) -> Vec<SendMessageRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn read_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().read_calls.clone()
    }

    pub fn recall_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().recall_calls.clone()
    }
}

impl MessageApi for MockApi {
    fn send_message(&self, request: SendMessageRequest) -> ApiFuture<'_, SendAck> {
        Box::pin(async move {
            let scripted = {
                let mut state = self.state.lock().unwrap();
                state.requests.push(request);
                if state.hang_sends {
                    None
                } else {
                    Some(state.send_results.pop_front().unwrap_or_else(|| {
                        state.next_id += 1;
                        Ok(SendAck {
                            id: format!("srv-{}", state.next_id),
                            status: MessageStatus::Sent,
                        })
                    }))
                }
            };
            match scripted {
                Some(result) => result,
                None => std::future::pending().await,
            }
        })
    }

    fn get_offline_messages(&self) -> ApiFuture<'_, OfflineBatch> {
        Box::pin(async move {
            let delay = self.state.lock().unwrap().offline_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock().unwrap();
            if let Some(error) = state.offline_error.take() {
                return Err(error);
            }
            Ok(OfflineBatch {
                messages: std::mem::take(&mut state.offline),
                skipped: 0,
            })
        })
    }

    fn mark_as_read(&self, conversation_id: &str) -> ApiFuture<'_, ()> {
        let conversation_id = conversation_id.to_string();
        Box::pin(async move {
            self.state.lock().unwrap().read_calls.push(conversation_id);
            Ok(())
        })
    }

    fn recall_message(&self, message_id: &str) -> ApiFuture<'_, ()> {
        let message_id = message_id.to_string();
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.recall_calls.push(message_id);
            match state.recall_error.take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }
}
