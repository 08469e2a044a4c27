// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Socket layer under the connection manager.
//!
//! A [`Transport`] carries raw text frames for one connection attempt;
//! decoding them is left to the caller. Each attempt gets a fresh transport
//! from a [`TransportFactory`], so tests can swap in scripted sockets.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use lx_core::protocol::OutboundFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Failures of a single socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not open socket: {0}")]
    ConnectionFailed(String),

    #[error("socket is not open")]
    ConnectionClosed,

    #[error("write to socket failed: {0}")]
    SendFailed(String),

    #[error("read from socket failed: {0}")]
    ReceiveFailed(String),

    #[error("could not encode frame: {0}")]
    Encode(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// One bidirectional text-frame socket.
pub trait Transport: Send + Sync {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()>;

    /// Close the socket. Closing an unopened socket is not an error.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    fn send(&mut self, frame: OutboundFrame) -> TransportFuture<'_, ()>;

    /// Next text frame, or `None` once the peer has closed.
    fn recv(&mut self) -> TransportFuture<'_, Option<String>>;
}

pub type TransportFactory = Arc<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

pub fn websocket_factory() -> TransportFactory {
    Arc::new(|| -> Box<dyn Transport> { Box::new(WebSocketTransport::new()) })
}

/// Append the bearer token as the `token` query parameter.
pub fn with_token(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}token={token}")
}

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// [`Transport`] over `tokio-tungstenite`.
#[derive(Default)]
pub struct WebSocketTransport {
    socket: Option<Socket>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&mut self) -> TransportResult<&mut Socket> {
        self.socket.as_mut().ok_or(TransportError::ConnectionClosed)
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            self.socket = Some(socket);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut socket) = self.socket.take() {
                // Best effort; the peer may already be gone.
                let _ = socket.close(None).await;
            }
            Ok(())
        })
    }

    fn send(&mut self, frame: OutboundFrame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let text = frame
                .to_json()
                .map_err(|e| TransportError::Encode(e.to_string()))?;
            let written = self.open()?.send(WsMessage::Text(text.into())).await;
            written.map_err(|e| {
                self.socket = None;
                TransportError::SendFailed(e.to_string())
            })
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<String>> {
        Box::pin(async move {
            loop {
                let next = self.open()?.next().await;
                match next {
                    Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                    Some(Ok(WsMessage::Close(_))) | None => {
                        self.socket = None;
                        return Ok(None);
                    }
                    Some(Err(e)) => {
                        self.socket = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                    // Ping/pong is answered by tungstenite; binary is unused.
                    Some(Ok(_)) => {}
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
