// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::events::EventStream;
use crate::test_helpers::{drain, next_matching, registry, MockServer};
use yare::parameterized;

#[derive(Default)]
struct Recorder {
    connected: AtomicUsize,
    disconnected: AtomicUsize,
    frames: Mutex<Vec<InboundFrame>>,
}

impl SessionHandler for Recorder {
    fn on_connected(&self) {
        self.connected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_disconnected(&self) {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_frame(&self, frame: InboundFrame) {
        self.frames.lock().unwrap().push(frame);
    }
}

struct Harness {
    manager: ConnectionManager,
    recorder: Arc<Recorder>,
    events: EventStream,
}

fn harness(server: &MockServer, names: &[&str], settings: ConnectionSettings) -> Harness {
    let events = EventBus::new(256);
    let stream = events.subscribe();
    let recorder = Arc::new(Recorder::default());
    let manager = ConnectionManager::spawn(
        settings,
        registry(names),
        server.factory(),
        Arc::clone(&recorder) as Arc<dyn SessionHandler>,
        events,
    );
    Harness {
        manager,
        recorder,
        events: stream,
    }
}

fn is_state(event: &ClientEvent, state: ConnectionState) -> bool {
    matches!(event, ClientEvent::StateChanged { state: s } if *s == state)
}

async fn wait_state(events: &mut EventStream, state: ConnectionState) {
    next_matching(events, |e| is_state(e, state)).await;
}

#[parameterized(
    disconnected = { ConnectionState::Disconnected, "disconnected" },
    connecting = { ConnectionState::Connecting, "connecting" },
    connected = { ConnectionState::Connected, "connected" },
    reconnecting = { ConnectionState::Reconnecting, "reconnecting" },
    failed = { ConnectionState::Failed, "failed" },
)]
fn state_names(state: ConnectionState, name: &str) {
    assert_eq!(state.as_str(), name);
    assert_eq!(state.to_string(), name);
}

#[test]
fn settings_follow_config() {
    let mut config = ClientConfig::new(vec![crate::test_helpers::endpoint("a")]);
    config.token = "t".into();
    config.reconnect_max_attempts = Some(4);
    config.heartbeat_interval_ms = 1000;
    let settings = ConnectionSettings::from_config(&config);
    assert_eq!(settings.token, "t");
    assert_eq!(settings.max_attempts, Some(4));
    assert_eq!(settings.heartbeat.interval, Duration::from_secs(1));
    assert_eq!(settings.backoff, Backoff::new(1000, 60_000));
}

#[tokio::test(start_paused = true)]
async fn connect_reaches_connected() {
    let server = MockServer::new();
    let settings = ConnectionSettings {
        token: "secret".into(),
        ..ConnectionSettings::default()
    };
    let mut h = harness(&server, &["a"], settings);
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);

    h.manager.connect();
    assert_eq!(h.manager.state(), ConnectionState::Connecting);
    wait_state(&mut h.events, ConnectionState::Connected).await;

    assert_eq!(h.manager.state(), ConnectionState::Connected);
    assert_eq!(h.recorder.connected.load(Ordering::SeqCst), 1);
    assert_eq!(server.attempts(), vec!["ws://a.test/ws?token=secret"]);
}

#[tokio::test(start_paused = true)]
async fn connect_while_connected_is_a_noop() {
    let server = MockServer::new();
    let mut h = harness(&server, &["a"], ConnectionSettings::default());
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;

    h.manager.connect();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(server.attempts().len(), 1);
    assert_eq!(h.recorder.connected.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn two_failures_fail_over_before_third_attempt() {
    let server = MockServer::new();
    server.fail_next_connects(2);
    let mut h = harness(&server, &["a", "b"], ConnectionSettings::default());

    h.manager.connect();
    let switched = next_matching(&mut h.events, |e| {
        matches!(e, ClientEvent::EndpointSwitched { .. })
    })
    .await;
    assert_eq!(
        switched,
        ClientEvent::EndpointSwitched {
            from: "a".into(),
            to: "b".into()
        }
    );
    wait_state(&mut h.events, ConnectionState::Connected).await;

    assert_eq!(
        server.attempts(),
        vec!["ws://a.test/ws", "ws://a.test/ws", "ws://b.test/ws"]
    );
    assert_eq!(h.manager.registry().index(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_delays_double_up_to_the_cap() {
    let server = MockServer::new();
    server.set_fail_all(true);
    let settings = ConnectionSettings {
        backoff: Backoff::new(1000, 5000),
        ..ConnectionSettings::default()
    };
    let mut h = harness(&server, &["a"], settings);

    h.manager.connect();
    let mut delays = Vec::new();
    for _ in 0..5 {
        match next_matching(&mut h.events, |e| {
            matches!(e, ClientEvent::ReconnectScheduled { .. })
        })
        .await
        {
            ClientEvent::ReconnectScheduled { delay_ms, .. } => delays.push(delay_ms),
            _ => unreachable!(),
        }
    }
    assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
    // A single endpoint never fails over.
    assert!(server.attempts().iter().all(|u| u == "ws://a.test/ws"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_enters_failed_until_connect() {
    let server = MockServer::new();
    server.set_fail_all(true);
    let settings = ConnectionSettings {
        max_attempts: Some(2),
        ..ConnectionSettings::default()
    };
    let mut h = harness(&server, &["a"], settings);

    h.manager.connect();
    let mut states = Vec::new();
    while states.last() != Some(&ConnectionState::Failed) {
        let event = next_matching(&mut h.events, |e| {
            matches!(e, ClientEvent::StateChanged { .. })
        })
        .await;
        if let ClientEvent::StateChanged { state } = event {
            states.push(state);
        }
    }
    assert_eq!(
        states[states.len() - 3..],
        [
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::Failed
        ]
    );
    assert_eq!(server.attempts().len(), 3);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(server.attempts().len(), 3);
    assert_eq!(h.manager.state(), ConnectionState::Failed);

    server.set_fail_all(false);
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    let server = MockServer::new();
    server.set_fail_all(true);
    let mut h = harness(&server, &["a"], ConnectionSettings::default());

    h.manager.connect();
    next_matching(&mut h.events, |e| {
        matches!(e, ClientEvent::ReconnectScheduled { .. })
    })
    .await;
    drain(&mut h.events);
    let attempts = server.attempts().len();

    h.manager.disconnect();
    h.manager.disconnect();
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(server.attempts().len(), attempts);
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(
        drain(&mut h.events),
        vec![ClientEvent::StateChanged {
            state: ConnectionState::Disconnected
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_connected_notifies_handler_once() {
    let server = MockServer::new();
    let mut h = harness(&server, &["a"], ConnectionSettings::default());
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;

    h.manager.disconnect();
    assert_eq!(h.recorder.disconnected.load(Ordering::SeqCst), 1);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.recorder.disconnected.load(Ordering::SeqCst), 1);
    assert_eq!(server.ping_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn missed_pongs_mark_link_poor_and_reconnect() {
    let server = MockServer::silent();
    let mut h = harness(&server, &["a"], ConnectionSettings::default());
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;
    let start = Instant::now();

    let poor = next_matching(&mut h.events, |e| {
        matches!(e, ClientEvent::QualityChanged { .. })
    })
    .await;
    assert_eq!(
        poor,
        ClientEvent::QualityChanged {
            quality: ConnectionQuality::Poor,
            latency_ms: None
        }
    );
    // Pings at 30s, 60s and 90s; the third times out at 95s.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(95) && elapsed < Duration::from_secs(96));
    assert_eq!(server.ping_count(), 3);

    wait_state(&mut h.events, ConnectionState::Reconnecting).await;
    assert_eq!(h.recorder.disconnected.load(Ordering::SeqCst), 1);
    wait_state(&mut h.events, ConnectionState::Connected).await;
    assert_eq!(server.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn pong_reports_quality() {
    let server = MockServer::new();
    let mut h = harness(&server, &["a"], ConnectionSettings::default());
    h.manager.connect();

    let quality = next_matching(&mut h.events, |e| {
        matches!(e, ClientEvent::QualityChanged { .. })
    })
    .await;
    assert_eq!(
        quality,
        ClientEvent::QualityChanged {
            quality: ConnectionQuality::Excellent,
            latency_ms: Some(0)
        }
    );
    assert_eq!(h.manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn bad_frames_are_dropped_without_closing() {
    let server = MockServer::new();
    let mut h = harness(&server, &["a"], ConnectionSettings::default());
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;

    server.push("not json");
    server.push(r#"{"type":"typing","data":{}}"#);
    server.push(r#"{"type":"new_message","data":{"message":{"id":true}}}"#);
    server.push(
        r#"{"type":"new_message","data":{"message":{"id":1,"conversation_id":2,"sender_id":3,"content":"hi","created_at":"2026-01-01T00:00:00Z"}}}"#,
    );
    server.push(r#"{"type":"user_online","data":{"user_id":5}}"#);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let frames = h.recorder.frames.lock().unwrap().clone();
    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[0], InboundFrame::NewMessage(m) if m.id == "1"));
    assert_eq!(
        frames[1],
        InboundFrame::Presence {
            user_id: "5".into(),
            online: true
        }
    );
    assert_eq!(h.manager.state(), ConnectionState::Connected);
    assert_eq!(server.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn server_switch_reconnects_after_fixed_delay() {
    let server = MockServer::new();
    let mut h = harness(&server, &["a", "b"], ConnectionSettings::default());
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;

    server.push(r#"{"type":"server_switch"}"#);
    let scheduled = next_matching(&mut h.events, |e| {
        matches!(e, ClientEvent::ReconnectScheduled { .. })
    })
    .await;
    assert_eq!(
        scheduled,
        ClientEvent::ReconnectScheduled {
            attempt: 0,
            delay_ms: 2000
        }
    );
    let start = Instant::now();
    wait_state(&mut h.events, ConnectionState::Connected).await;
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(server.attempts(), vec!["ws://a.test/ws", "ws://a.test/ws"]);
}

#[tokio::test(start_paused = true)]
async fn server_close_reconnects_with_initial_delay() {
    let server = MockServer::new();
    let mut h = harness(&server, &["a"], ConnectionSettings::default());
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;

    server.close();
    let scheduled = next_matching(&mut h.events, |e| {
        matches!(e, ClientEvent::ReconnectScheduled { .. })
    })
    .await;
    assert_eq!(
        scheduled,
        ClientEvent::ReconnectScheduled {
            attempt: 1,
            delay_ms: 1000
        }
    );
    wait_state(&mut h.events, ConnectionState::Connected).await;
    assert_eq!(h.recorder.connected.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn connect_during_backoff_retries_immediately() {
    let server = MockServer::new();
    server.fail_next_connects(1);
    let settings = ConnectionSettings {
        backoff: Backoff::new(30_000, 60_000),
        ..ConnectionSettings::default()
    };
    let mut h = harness(&server, &["a"], settings);
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Reconnecting).await;

    let start = Instant::now();
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(server.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn reconnect_to_primary_returns_to_first_endpoint() {
    let server = MockServer::new();
    server.fail_next_connects(2);
    let mut h = harness(&server, &["a", "b"], ConnectionSettings::default());
    h.manager.connect();
    wait_state(&mut h.events, ConnectionState::Connected).await;
    assert_eq!(h.manager.registry().index(), 1);

    h.manager.reconnect_to_primary();
    wait_state(&mut h.events, ConnectionState::Connected).await;
    assert_eq!(h.manager.registry().index(), 0);
    assert_eq!(server.attempts().last().unwrap(), "ws://a.test/ws");
}
