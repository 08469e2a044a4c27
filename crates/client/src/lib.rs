// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lx-client: realtime messaging runtime
//!
//! Maintains the live connection to the messaging backend, recovers from
//! network failures with backoff and endpoint failover, and keeps outgoing
//! and incoming messages consistent across disconnects.
//!
//! Start with [`ImClient::builder`].

pub mod api;
pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use api::{ApiError, HttpMessageApi, MessageApi};
pub use client::{ClientBuilder, ImClient};
pub use config::{ClientConfig, ConfigError, Endpoint};
pub use connection::{ConnectionManager, ConnectionState};
pub use endpoint::EndpointRegistry;
pub use error::{Error, Result};
pub use events::{ClientEvent, EventStream};
pub use heartbeat::ConnectionQuality;
pub use sync::{CacheStats, OutboxItem};
