// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use lx_client::{ClientConfig, ImClient};
use lx_core::MessageDraft;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::error::Result;

/// Stream events to stdout until interrupted, sending stdin lines.
pub async fn run(config: ClientConfig, sender: &str) -> Result<()> {
    let client = ImClient::builder(config).build()?;
    let mut events = client.subscribe();
    client.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => send_line(&client, sender, &line),
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    client.disconnect();
    Ok(())
}

fn send_line(client: &ImClient, sender: &str, line: &str) {
    let Some((receiver, text)) = parse_line(line) else {
        if !line.trim().is_empty() {
            warn!("expected '<receiver_id> <text>'");
        }
        return;
    };
    let draft = MessageDraft::text(receiver, sender, receiver, text);
    if let Err(e) = client.send(draft) {
        warn!(error = %e, "failed to queue message");
    }
}

/// Split `<receiver_id> <text>`.
pub(crate) fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (receiver, text) = line.trim().split_once(char::is_whitespace)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((receiver, text))
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
