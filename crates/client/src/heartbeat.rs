// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat liveness tracking and connection quality.
//!
//! [`HeartbeatMonitor`] holds no timers of its own. The connection task
//! drives it from its `select!` loop: [`HeartbeatMonitor::on_interval`] on
//! every heartbeat tick, [`HeartbeatMonitor::on_ping_timeout`] when the
//! deadline from [`HeartbeatMonitor::ping_deadline`] passes, and
//! [`HeartbeatMonitor::on_pong`] for every pong frame.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Link quality derived from ping round-trip time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ConnectionQuality {
    /// Classify a round-trip latency.
    pub fn from_latency_ms(latency_ms: u64) -> Self {
        match latency_ms {
            0..=99 => ConnectionQuality::Excellent,
            100..=299 => ConnectionQuality::Good,
            300..=799 => ConnectionQuality::Fair,
            _ => ConnectionQuality::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionQuality::Excellent => "excellent",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Fair => "fair",
            ConnectionQuality::Poor => "poor",
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub timeout: Duration,
    /// Consecutive missed pongs that mark the link dead.
    pub poor_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        HeartbeatConfig {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            poor_threshold: 3,
        }
    }
}

/// Heartbeat bookkeeping for the current connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatRecord {
    pub last_sent_at: Option<Instant>,
    pub awaiting_pong: bool,
    pub consecutive_failures: u32,
    pub last_latency_ms: Option<u64>,
}

/// What the connection task should do after an interval tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    SendPing,
    /// Too many missed pongs; tear the transport down.
    Dead,
}

#[derive(Debug)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    record: HeartbeatRecord,
    running: bool,
    // The outstanding ping has already been counted as a failure.
    miss_counted: bool,
}

impl HeartbeatMonitor {
    pub fn new(config: HeartbeatConfig) -> Self {
        HeartbeatMonitor {
            config,
            record: HeartbeatRecord::default(),
            running: false,
            miss_counted: false,
        }
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    pub fn record(&self) -> &HeartbeatRecord {
        &self.record
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begin monitoring a fresh connection.
    pub fn start(&mut self) {
        self.record = HeartbeatRecord::default();
        self.miss_counted = false;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.record.awaiting_pong = false;
    }

    /// Handle an interval tick.
    ///
    /// An unanswered ping that was not already counted by its timeout is
    /// counted now. Returns `Dead` once the failure threshold is reached.
    pub fn on_interval(&mut self, now: Instant) -> Option<HeartbeatAction> {
        if !self.running {
            return None;
        }
        if self.record.awaiting_pong && !self.miss_counted {
            self.record.consecutive_failures += 1;
        }
        if self.is_dead() {
            return Some(HeartbeatAction::Dead);
        }
        self.record.last_sent_at = Some(now);
        self.record.awaiting_pong = true;
        self.miss_counted = false;
        Some(HeartbeatAction::SendPing)
    }

    /// When the outstanding ping times out, if there is one still uncounted.
    pub fn ping_deadline(&self) -> Option<Instant> {
        if !self.running || !self.record.awaiting_pong || self.miss_counted {
            return None;
        }
        self.record.last_sent_at.map(|sent| sent + self.config.timeout)
    }

    /// Count the outstanding ping as missed.
    pub fn on_ping_timeout(&mut self) -> Option<HeartbeatAction> {
        if self.ping_deadline().is_none() {
            return None;
        }
        self.miss_counted = true;
        self.record.consecutive_failures += 1;
        if self.is_dead() {
            Some(HeartbeatAction::Dead)
        } else {
            None
        }
    }

    /// Handle a pong. Returns the latency and its classification, or `None`
    /// for a pong nobody asked for.
    pub fn on_pong(&mut self, now: Instant) -> Option<(u64, ConnectionQuality)> {
        if !self.running || !self.record.awaiting_pong {
            return None;
        }
        let sent = self.record.last_sent_at?;
        let latency_ms = now.saturating_duration_since(sent).as_millis() as u64;
        self.record.awaiting_pong = false;
        self.record.consecutive_failures = 0;
        self.record.last_latency_ms = Some(latency_ms);
        self.miss_counted = false;
        Some((latency_ms, ConnectionQuality::from_latency_ms(latency_ms)))
    }

    fn is_dead(&self) -> bool {
        self.record.consecutive_failures >= self.config.poor_threshold
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
