// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for lx-core operations.

use thiserror::Error;

/// All possible errors that can occur in lx-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error(
        "invalid message type: '{0}'\n  hint: valid types are: text, image, voice, video, file"
    )]
    InvalidMessageType(String),

    #[error("invalid message status: '{0}'\n  hint: valid statuses are: pending, sent, delivered, read, recalled, failed")]
    InvalidStatus(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("malformed '{kind}' frame: {reason}")]
    MalformedFrame { kind: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl Error {
    /// Returns true for wire-level decoding failures that only affect one frame.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::InvalidFrame(_) | Error::MalformedFrame { .. })
    }
}

/// A specialized Result type for lx-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
