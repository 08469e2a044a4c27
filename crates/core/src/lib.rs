// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lx-core: Shared library for the lx messaging client
//!
//! This crate provides the message model, the wire codec, the SQLite
//! message store and small primitives (clock, ids) used by the client
//! runtime and the `lx` CLI.

pub mod clock;
pub mod error;
pub mod id;
pub mod model;
pub mod protocol;
pub mod store;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use id::IdGenerator;
pub use model::{Message, MessageDraft, MessageStatus, MessageType};
pub use protocol::{Decoded, InboundFrame, OutboundFrame};
pub use store::{MessageStore, SqliteStore};
