// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP message API collaborator.
//!
//! Every response is wrapped in `{code, message, data}` where `code == 0`
//! means success. [`HttpMessageApi`] always targets the API base URL of the
//! endpoint currently selected in the [`EndpointRegistry`], so REST calls
//! fail over together with the socket.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lx_core::{Message, MessageStatus, MessageType};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endpoint::EndpointRegistry;

/// Errors returned by the HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, reset, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success HTTP status.
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    /// The envelope carried a non-zero code.
    #[error("rejected by server (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Returns true if retrying the same request cannot succeed.
    ///
    /// Client-side HTTP statuses and 4xx envelope codes are permanent,
    /// except request timeout and rate limiting.
    pub fn is_permanent(&self) -> bool {
        match self {
            ApiError::Network(_) => false,
            ApiError::Http { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            ApiError::Rejected { code, .. } => (400..500).contains(code) && *code != 429,
            ApiError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed future returned by [`MessageApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// `{code, message, data}` response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload of a successful response.
    pub fn into_result(self) -> ApiResult<Option<T>> {
        if self.code != 0 {
            return Err(ApiError::Rejected {
                code: self.code,
                message: self.message,
            });
        }
        Ok(self.data)
    }
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Echoed back in status frames so the client can match acknowledgements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl From<&Message> for SendMessageRequest {
    fn from(message: &Message) -> Self {
        SendMessageRequest {
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            message_type: message.message_type,
            file_url: message.file_url.clone(),
            file_size: message.file_size,
            duration: message.duration,
            correlation_id: message.correlation_id.clone(),
        }
    }
}

/// Server acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAck {
    pub id: String,
    pub status: MessageStatus,
}

/// Messages buffered server-side while the client was away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfflineBatch {
    pub messages: Vec<Message>,
    /// Entries that failed to parse and were skipped.
    pub skipped: usize,
}

impl OfflineBatch {
    /// Parse entries one by one, keeping those that decode.
    pub fn from_values(values: Vec<serde_json::Value>) -> Self {
        let mut batch = OfflineBatch::default();
        for value in values {
            match serde_json::from_value::<Message>(value) {
                Ok(message) => batch.messages.push(message),
                Err(e) => {
                    warn!(error = %e, "skipping unparseable offline message");
                    batch.skipped += 1;
                }
            }
        }
        batch
    }
}

/// The HTTP operations the messaging core depends on.
pub trait MessageApi: Send + Sync {
    fn send_message(&self, request: SendMessageRequest) -> ApiFuture<'_, SendAck>;

    fn get_offline_messages(&self) -> ApiFuture<'_, OfflineBatch>;

    fn mark_as_read(&self, conversation_id: &str) -> ApiFuture<'_, ()>;

    fn recall_message(&self, message_id: &str) -> ApiFuture<'_, ()>;
}

#[derive(Deserialize)]
struct SendMessageData {
    message: Message,
}

#[derive(Deserialize)]
struct OfflineData {
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

/// reqwest-backed [`MessageApi`].
pub struct HttpMessageApi {
    client: Client,
    registry: Arc<EndpointRegistry>,
    token: String,
}

impl HttpMessageApi {
    pub fn new(registry: Arc<EndpointRegistry>, token: impl Into<String>) -> Self {
        HttpMessageApi {
            client: Client::new(),
            registry,
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let base = self.registry.current().api_url;
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ApiResult<Option<T>> {
        let request = if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        };
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: ApiResponse<T> = resp.json().await?;
        envelope.into_result()
    }
}

impl MessageApi for HttpMessageApi {
    fn send_message(&self, request: SendMessageRequest) -> ApiFuture<'_, SendAck> {
        Box::pin(async move {
            let url = self.url("/messages");
            debug!(%url, receiver = %request.receiver_id, "sending message");
            let data: Option<SendMessageData> =
                self.call(self.client.post(&url).json(&request)).await?;
            let message = data
                .ok_or_else(|| ApiError::InvalidResponse("missing message in response".into()))?
                .message;
            Ok(SendAck {
                id: message.id,
                status: message.status,
            })
        })
    }

    fn get_offline_messages(&self) -> ApiFuture<'_, OfflineBatch> {
        Box::pin(async move {
            let url = self.url("/messages/offline");
            let data: Option<OfflineData> = self.call(self.client.get(&url)).await?;
            Ok(OfflineBatch::from_values(
                data.map(|d| d.messages).unwrap_or_default(),
            ))
        })
    }

    fn mark_as_read(&self, conversation_id: &str) -> ApiFuture<'_, ()> {
        let url = self.url(&format!("/conversations/{conversation_id}/read"));
        Box::pin(async move {
            let _: Option<serde_json::Value> = self.call(self.client.post(&url)).await?;
            Ok(())
        })
    }

    fn recall_message(&self, message_id: &str) -> ApiFuture<'_, ()> {
        let url = self.url(&format!("/messages/{message_id}/recall"));
        Box::pin(async move {
            let _: Option<serde_json::Value> = self.call(self.client.post(&url)).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
