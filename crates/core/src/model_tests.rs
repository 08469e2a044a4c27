// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

#[parameterized(
    text = { "text", MessageType::Text },
    image = { "image", MessageType::Image },
    voice = { "voice", MessageType::Voice },
    video = { "video", MessageType::Video },
    file = { "file", MessageType::File },
    upper = { "IMAGE", MessageType::Image },
)]
fn message_type_from_str_valid(input: &str, expected: MessageType) {
    assert_eq!(input.parse::<MessageType>().unwrap(), expected);
}

#[parameterized(
    invalid = { "sticker" },
    empty = { "" },
)]
fn message_type_from_str_invalid(input: &str) {
    assert!(input.parse::<MessageType>().is_err());
}

#[parameterized(
    pending = { "pending", MessageStatus::Pending },
    sent = { "sent", MessageStatus::Sent },
    delivered = { "delivered", MessageStatus::Delivered },
    read = { "read", MessageStatus::Read },
    recalled = { "recalled", MessageStatus::Recalled },
    failed = { "failed", MessageStatus::Failed },
    mixed = { "Delivered", MessageStatus::Delivered },
)]
fn status_from_str_valid(input: &str, expected: MessageStatus) {
    assert_eq!(input.parse::<MessageStatus>().unwrap(), expected);
    assert_eq!(expected.to_string(), input.to_lowercase());
}

#[test]
fn status_from_str_invalid() {
    assert!("seen".parse::<MessageStatus>().is_err());
}

#[parameterized(
    pending_to_sent = { MessageStatus::Pending, MessageStatus::Sent, true },
    sent_to_delivered = { MessageStatus::Sent, MessageStatus::Delivered, true },
    sent_to_read = { MessageStatus::Sent, MessageStatus::Read, true },
    read_to_delivered = { MessageStatus::Read, MessageStatus::Delivered, false },
    delivered_to_sent = { MessageStatus::Delivered, MessageStatus::Sent, false },
    same = { MessageStatus::Sent, MessageStatus::Sent, false },
    read_to_recalled = { MessageStatus::Read, MessageStatus::Recalled, true },
    recalled_to_read = { MessageStatus::Recalled, MessageStatus::Read, false },
    pending_to_failed = { MessageStatus::Pending, MessageStatus::Failed, true },
    sent_to_failed = { MessageStatus::Sent, MessageStatus::Failed, false },
    failed_to_pending = { MessageStatus::Failed, MessageStatus::Pending, true },
    failed_to_sent = { MessageStatus::Failed, MessageStatus::Sent, true },
)]
fn status_transitions(from: MessageStatus, to: MessageStatus, allowed: bool) {
    assert_eq!(from.can_advance_to(to), allowed);
}

#[test]
fn deserializes_server_message_with_numeric_ids() {
    let json = r#"{
        "id": 42,
        "conversation_id": 7,
        "sender_id": 1,
        "receiver_id": 2,
        "content": "hi",
        "type": "text",
        "status": "delivered",
        "created_at": "2026-01-02T03:04:05Z",
        "updated_at": "2026-01-02T03:04:05Z"
    }"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.id, "42");
    assert_eq!(msg.conversation_id, "7");
    assert_eq!(msg.sender_id, "1");
    assert_eq!(msg.status, MessageStatus::Delivered);
    assert_eq!(msg.message_type, MessageType::Text);
    assert!(msg.correlation_id.is_none());
}

#[test]
fn deserializes_media_fields_and_defaults() {
    let json = r#"{
        "id": "m1",
        "conversation_id": "c1",
        "sender_id": "u1",
        "type": "voice",
        "file_url": "https://cdn.example/v.amr",
        "file_size": 2048,
        "duration": 12,
        "created_at": "2026-01-02T03:04:05Z"
    }"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.message_type, MessageType::Voice);
    assert_eq!(msg.file_url.as_deref(), Some("https://cdn.example/v.amr"));
    assert_eq!(msg.file_size, Some(2048));
    assert_eq!(msg.duration, Some(12));
    assert_eq!(msg.status, MessageStatus::Sent);
    assert_eq!(msg.receiver_id, "");
}

#[test]
fn from_draft_is_pending_and_provisional() {
    let draft = MessageDraft::text("c1", "u1", "u2", "hello");
    let msg = Message::from_draft(draft, "local-abc".to_string(), at(100));
    assert_eq!(msg.id, "local-abc");
    assert_eq!(msg.status, MessageStatus::Pending);
    assert!(msg.is_provisional());
    assert_eq!(msg.created_at, at(100));
}

#[test]
fn advance_status_ignores_regressions() {
    let draft = MessageDraft::text("c1", "u1", "u2", "hello");
    let mut msg = Message::from_draft(draft, "local-abc".to_string(), at(100));
    assert!(msg.advance_status(MessageStatus::Read, at(200)));
    assert!(!msg.advance_status(MessageStatus::Delivered, at(300)));
    assert_eq!(msg.status, MessageStatus::Read);
    assert_eq!(msg.updated_at, at(200));
}
