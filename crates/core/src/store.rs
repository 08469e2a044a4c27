// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent message storage.
//!
//! [`MessageStore`] is the seam the sync engine writes through;
//! [`SqliteStore`] is the on-device implementation.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{Message, MessageStatus};

/// Storage operations needed by the messaging client.
///
/// Writes take `&mut self`; callers serialize access (the client keeps the
/// store behind a mutex).
pub trait MessageStore: Send {
    /// Insert or replace a message by id.
    fn insert(&mut self, message: &Message) -> Result<()>;

    /// Insert or replace several messages in one transaction.
    fn insert_many(&mut self, messages: &[Message]) -> Result<()>;

    /// Fetch one message by id.
    fn get(&self, id: &str) -> Result<Option<Message>>;

    /// Messages in a conversation, newest first.
    fn query_by_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>>;

    /// Set the status of a message. Returns false if no such row exists.
    fn update_status(&mut self, id: &str, status: MessageStatus, at: DateTime<Utc>)
        -> Result<bool>;

    /// Replace a provisional id with the server-assigned one.
    ///
    /// If a row with `new_id` already exists (the server echo arrived first)
    /// the provisional row is folded into it.
    fn rewrite_id(
        &mut self,
        old_id: &str,
        new_id: &str,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Mark every sent or delivered message addressed to `reader_id` in a
    /// conversation as read. Returns the number of rows changed.
    fn mark_conversation_read(
        &mut self,
        conversation_id: &str,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Delete a message. Returns false if no such row exists.
    fn delete(&mut self, id: &str) -> Result<bool>;

    /// All messages still awaiting delivery, oldest first.
    fn pending(&self) -> Result<Vec<Message>>;

    /// Delete messages created before `cutoff`, except pending ones.
    fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Number of stored messages.
    fn count(&self) -> Result<usize>;

    /// Delete everything.
    fn clear(&mut self) -> Result<()>;
}

/// SQL schema for the message database.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    correlation_id TEXT,
    conversation_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    content TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'text',
    file_url TEXT,
    file_size INTEGER,
    duration INTEGER,
    status TEXT NOT NULL DEFAULT 'sent',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_status ON messages(status);
CREATE INDEX IF NOT EXISTS idx_messages_correlation ON messages(correlation_id);
"#;

const COLUMNS: &str = "id, correlation_id, conversation_id, sender_id, receiver_id, content,
     type, file_url, file_size, duration, status, created_at, updated_at";

/// Run schema creation on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Format a timestamp so that lexical order matches chronological order.
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

fn message_from_row(row: &Row<'_>) -> std::result::Result<Message, rusqlite::Error> {
    let type_str: String = row.get(6)?;
    let status_str: String = row.get(10)?;
    let created_str: String = row.get(11)?;
    let updated_str: String = row.get(12)?;

    Ok(Message {
        id: row.get(0)?,
        correlation_id: row.get(1)?,
        conversation_id: row.get(2)?,
        sender_id: row.get(3)?,
        receiver_id: row.get(4)?,
        content: row.get(5)?,
        message_type: parse_db(&type_str, "type")?,
        file_url: row.get(7)?,
        file_size: row.get(8)?,
        duration: row.get(9)?,
        status: parse_db(&status_str, "status")?,
        created_at: parse_timestamp(&created_str, "created_at")?,
        updated_at: parse_timestamp(&updated_str, "updated_at")?,
    })
}

fn upsert(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, correlation_id, conversation_id, sender_id, receiver_id,
         content, type, file_url, file_size, duration, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(id) DO UPDATE SET
             correlation_id = COALESCE(excluded.correlation_id, messages.correlation_id),
             conversation_id = excluded.conversation_id,
             sender_id = excluded.sender_id,
             receiver_id = excluded.receiver_id,
             content = excluded.content,
             type = excluded.type,
             file_url = excluded.file_url,
             file_size = excluded.file_size,
             duration = excluded.duration,
             status = excluded.status,
             updated_at = excluded.updated_at",
        params![
            message.id,
            message.correlation_id,
            message.conversation_id,
            message.sender_id,
            message.receiver_id,
            message.content,
            message.message_type.as_str(),
            message.file_url,
            message.file_size,
            message.duration,
            message.status.as_str(),
            format_timestamp(&message.created_at),
            format_timestamp(&message.updated_at),
        ],
    )?;
    Ok(())
}

/// SQLite-backed [`MessageStore`].
pub struct SqliteStore {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl SqliteStore {
    /// Open a database at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        run_migrations(&conn)?;
        Ok(SqliteStore { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(SqliteStore { conn })
    }
}

impl MessageStore for SqliteStore {
    fn insert(&mut self, message: &Message) -> Result<()> {
        upsert(&self.conn, message)
    }

    fn insert_many(&mut self, messages: &[Message]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for message in messages {
            upsert(&tx, message)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Message>> {
        let sql = format!("SELECT {COLUMNS} FROM messages WHERE id = ?1");
        let message = self
            .conn
            .query_row(&sql, params![id], message_from_row)
            .optional()?;
        Ok(message)
    }

    fn query_by_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM messages WHERE conversation_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let messages = stmt
            .query_map(
                params![conversation_id, limit as i64, offset as i64],
                message_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn update_status(
        &mut self,
        id: &str,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), format_timestamp(&at), id],
        )?;
        Ok(changed > 0)
    }

    fn rewrite_id(
        &mut self,
        old_id: &str,
        new_id: &str,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if old_id == new_id {
            self.update_status(new_id, status, at)?;
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        let server_row_exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM messages WHERE id = ?1",
            params![new_id],
            |row| row.get(0),
        )?;

        if server_row_exists {
            tx.execute("DELETE FROM messages WHERE id = ?1", params![old_id])?;
            tx.execute(
                "UPDATE messages SET status = ?1, updated_at = ?2,
                 correlation_id = COALESCE(correlation_id, ?3) WHERE id = ?4",
                params![status.as_str(), format_timestamp(&at), old_id, new_id],
            )?;
        } else {
            let changed = tx.execute(
                "UPDATE messages SET id = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                params![new_id, status.as_str(), format_timestamp(&at), old_id],
            )?;
            if changed == 0 {
                return Err(Error::MessageNotFound(old_id.to_string()));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn mark_conversation_read(
        &mut self,
        conversation_id: &str,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE messages SET status = 'read', updated_at = ?1
             WHERE conversation_id = ?2 AND receiver_id = ?3
               AND status IN ('sent', 'delivered')",
            params![format_timestamp(&at), conversation_id, reader_id],
        )?;
        Ok(changed)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn pending(&self) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM messages WHERE status = 'pending'
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let messages = stmt
            .query_map([], message_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM messages WHERE created_at < ?1 AND status != 'pending'",
            params![format_timestamp(&cutoff)],
        )?;
        Ok(deleted)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn clear(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM messages", [])?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
