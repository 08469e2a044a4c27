// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use lx_client::client::DB_FILE_NAME;
use lx_client::ClientConfig;
use lx_core::{MessageStore, SqliteStore};

use crate::error::{Error, Result};

/// Print stored messages as JSON lines, newest first.
pub fn run(config: &ClientConfig, conversation: &str, limit: usize, offset: usize) -> Result<()> {
    let dir = config.state_dir().ok_or(Error::NoStateDir)?;
    let store = SqliteStore::open(&dir.join(DB_FILE_NAME))?;
    for message in store.query_by_conversation(conversation, limit, offset)? {
        println!("{}", serde_json::to_string(&message)?);
    }
    Ok(())
}
