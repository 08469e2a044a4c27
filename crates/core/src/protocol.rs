// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol frames for client-server communication.
//!
//! Every text frame is a JSON envelope `{"type": ..., "data": {...}}`:
//! - Client sends `ping` keepalives
//! - Server pushes messages, receipts, presence and control signals

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{flex_id, Message, MessageStatus};

/// Raw `{type, data}` envelope shared by every frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// Frames sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Keepalive; the server answers with `pong`.
    Ping,
}

impl OutboundFrame {
    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reference to a message affected by a read or recall.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRef {
    #[serde(with = "flex_id")]
    pub message_id: String,
    #[serde(with = "flex_id", default)]
    pub conversation_id: String,
}

/// A peer has read a conversation up to now.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadReceipt {
    #[serde(with = "flex_id")]
    pub conversation_id: String,
    #[serde(with = "flex_id")]
    pub reader_id: String,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

/// Incoming call signal. Call handling itself lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallInvite {
    #[serde(with = "flex_id")]
    pub caller_id: String,
    #[serde(default)]
    pub caller_username: String,
    pub room_id: String,
    #[serde(default)]
    pub call_type: String,
}

/// Server-reported status change for one message.
///
/// When the server echoes the client's correlation id the update doubles
/// as a send acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    #[serde(with = "flex_id")]
    pub message_id: String,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Deserialize)]
struct PresenceData {
    #[serde(with = "flex_id")]
    user_id: String,
}

#[derive(Deserialize)]
struct WrappedMessage {
    message: Message,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Pong,
    NewMessage(Box<Message>),
    MessageRead(MessageRef),
    MessageRecalled(MessageRef),
    Presence { user_id: String, online: bool },
    ReadReceipt(ReadReceipt),
    CallInvite(CallInvite),
    MessageStatus(StatusUpdate),
    /// The server asks clients to reconnect, typically ahead of a restart.
    ServerSwitch,
}

impl InboundFrame {
    /// Wire type name of this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::Pong => "pong",
            InboundFrame::NewMessage(_) => "new_message",
            InboundFrame::MessageRead(_) => "message_read",
            InboundFrame::MessageRecalled(_) => "message_recalled",
            InboundFrame::Presence { online: true, .. } => "user_online",
            InboundFrame::Presence { online: false, .. } => "user_offline",
            InboundFrame::ReadReceipt(_) => "read_receipt",
            InboundFrame::CallInvite(_) => "call_invite",
            InboundFrame::MessageStatus(_) => "message_status",
            InboundFrame::ServerSwitch => "server_switch",
        }
    }
}

/// Result of decoding a frame whose envelope was valid.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Frame(InboundFrame),
    /// Envelope parsed but the type is not one we handle.
    Unknown(String),
}

/// Decode one inbound text frame.
///
/// An unparseable envelope yields [`Error::InvalidFrame`]; a known type with
/// a payload that does not fit yields [`Error::MalformedFrame`]. Neither is
/// fatal to the connection.
pub fn decode(text: &str) -> Result<Decoded> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| Error::InvalidFrame(e.to_string()))?;
    let kind = envelope.kind.as_str();
    let data = envelope.data;

    let frame = match kind {
        "pong" => InboundFrame::Pong,
        "new_message" | "message" => InboundFrame::NewMessage(Box::new(new_message(kind, data)?)),
        "message_read" => InboundFrame::MessageRead(payload(kind, data)?),
        "message_recalled" => InboundFrame::MessageRecalled(payload(kind, data)?),
        "user_online" | "user_offline" => {
            let presence: PresenceData = payload(kind, data)?;
            InboundFrame::Presence {
                user_id: presence.user_id,
                online: kind == "user_online",
            }
        }
        "read_receipt" => InboundFrame::ReadReceipt(payload(kind, data)?),
        "call_invite" => InboundFrame::CallInvite(payload(kind, data)?),
        "message_status" => InboundFrame::MessageStatus(payload(kind, data)?),
        "server_switch" => InboundFrame::ServerSwitch,
        other => return Ok(Decoded::Unknown(other.to_string())),
    };
    Ok(Decoded::Frame(frame))
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| Error::MalformedFrame {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

// Accepts both `{"message": {...}}` and the bare message object.
fn new_message(kind: &str, data: Value) -> Result<Message> {
    if data.get("message").is_some_and(Value::is_object) {
        let wrapped: WrappedMessage = payload(kind, data)?;
        return Ok(wrapped.message);
    }
    payload(kind, data)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
