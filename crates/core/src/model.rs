// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Core message types for the messaging client.
//!
//! This module contains [`Message`], its [`MessageType`] and
//! [`MessageStatus`], and the [`MessageDraft`] callers fill in to send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of payload a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Voice,
    Video,
    File,
}

impl MessageType {
    /// Returns the string representation used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Voice => "voice",
            MessageType::Video => "video",
            MessageType::File => "file",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "voice" => Ok(MessageType::Voice),
            "video" => Ok(MessageType::Video),
            "file" => Ok(MessageType::File),
            _ => Err(Error::InvalidMessageType(s.to_string())),
        }
    }
}

/// Delivery status of a message.
///
/// `Pending` and `Failed` are local-only; the server only ever reports the
/// remaining four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Queued locally, not yet acknowledged.
    Pending,
    /// Accepted by the server.
    #[default]
    Sent,
    /// Delivered to the recipient's device.
    Delivered,
    /// Seen by the recipient.
    Read,
    /// Withdrawn by the sender.
    Recalled,
    /// Gave up after exhausting the retry ceiling.
    Failed,
}

impl MessageStatus {
    /// Returns the string representation used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Recalled => "recalled",
            MessageStatus::Failed => "failed",
        }
    }

    /// Position along the delivery path; recall and failure sit outside it.
    fn progress(&self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Recalled | MessageStatus::Failed => None,
        }
    }

    /// Check whether a status update should be applied.
    ///
    /// Delivery progress never moves backwards (a late `delivered` does not
    /// undo `read`). `Recalled` is final. `Failed` only replaces `Pending`,
    /// and a failed message may be re-queued as `Pending`.
    pub fn can_advance_to(&self, target: MessageStatus) -> bool {
        if *self == target {
            return false;
        }
        match (self, target) {
            (MessageStatus::Recalled, _) => false,
            (_, MessageStatus::Recalled) => true,
            (MessageStatus::Failed, MessageStatus::Pending) => true,
            (MessageStatus::Failed, _) => target.progress().is_some(),
            (MessageStatus::Pending, MessageStatus::Failed) => true,
            (_, MessageStatus::Failed) => false,
            _ => match (self.progress(), target.progress()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    /// Returns true for states that will not change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Recalled | MessageStatus::Failed)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "recalled" => Ok(MessageStatus::Recalled),
            "failed" => Ok(MessageStatus::Failed),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// A chat message, either received from the server or originated locally.
///
/// `id` is the server-assigned id once acknowledged. Until then it holds the
/// provisional correlation id, and `correlation_id` carries the same value
/// so the acknowledgement can be matched back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(with = "flex_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(with = "flex_id")]
    pub conversation_id: String,
    #[serde(with = "flex_id")]
    pub sender_id: String,
    #[serde(with = "flex_id", default)]
    pub receiver_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    /// Object-storage reference for image/voice/video/file payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    /// Voice/video length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Build a locally originated message from a draft.
    pub fn from_draft(draft: MessageDraft, correlation_id: String, now: DateTime<Utc>) -> Self {
        Message {
            id: correlation_id.clone(),
            correlation_id: Some(correlation_id),
            conversation_id: draft.conversation_id,
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            content: draft.content,
            message_type: draft.message_type,
            file_url: draft.file_url,
            file_size: draft.file_size,
            duration: draft.duration,
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the server has not assigned an id yet.
    pub fn is_provisional(&self) -> bool {
        self.correlation_id.as_deref() == Some(self.id.as_str())
    }

    /// Apply a status update if it moves the message forward.
    ///
    /// Returns true if the status changed.
    pub fn advance_status(&mut self, status: MessageStatus, at: DateTime<Utc>) -> bool {
        if !self.status.can_advance_to(status) {
            return false;
        }
        self.status = status;
        self.updated_at = at;
        true
    }
}

/// Fields a caller supplies to send a message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageDraft {
    /// Caller-chosen correlation id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl MessageDraft {
    /// A plain text draft.
    pub fn text(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        MessageDraft {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Serde helper accepting ids as JSON strings or integers.
///
/// The backend emits numeric ids; locally generated ids are strings.
pub mod flex_id {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(id: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = String;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
                Ok(v.to_string())
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
                Ok(v.to_string())
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
