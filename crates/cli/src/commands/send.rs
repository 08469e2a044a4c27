// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use lx_client::{ClientConfig, ClientEvent, EventStream, ImClient};
use lx_core::MessageDraft;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{Error, Result};

/// Queue one message and wait up to `wait` for its outcome.
///
/// A message still unacknowledged when the wait ends stays queued in the
/// store and goes out with the next session.
pub async fn run(config: ClientConfig, draft: MessageDraft, wait: Duration) -> Result<()> {
    let client = ImClient::builder(config).build()?;
    let mut events = client.subscribe();
    let item = client.send(draft)?;
    let correlation_id = item.correlation_id().to_string();

    if wait.is_zero() {
        return print_pending(&correlation_id);
    }

    client.connect();
    match tokio::time::timeout(wait, outcome(&mut events, &correlation_id)).await {
        Ok(Some(ClientEvent::MessageFailed { reason, .. })) => Err(Error::SendFailed {
            correlation_id,
            reason,
        }),
        Ok(Some(event)) => {
            println!("{}", serde_json::to_string(&event)?);
            Ok(())
        }
        Ok(None) | Err(_) => print_pending(&correlation_id),
    }
}

async fn outcome(events: &mut EventStream, correlation_id: &str) -> Option<ClientEvent> {
    loop {
        match events.recv().await {
            Ok(event) => {
                let done = matches!(
                    &event,
                    ClientEvent::MessageSent { correlation_id: id, .. }
                        | ClientEvent::MessageFailed { correlation_id: id, .. }
                        if id == correlation_id
                );
                if done {
                    return Some(event);
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return None,
        }
    }
}

fn print_pending(correlation_id: &str) -> Result<()> {
    let line = serde_json::json!({
        "correlation_id": correlation_id,
        "status": "pending",
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}
