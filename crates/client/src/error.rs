// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the client crate.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors surfaced by [`ImClient`](crate::ImClient) and the sync engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] lx_core::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no state directory available; set state_dir in the config")]
    NoStateDir,

    #[error("the client must be built inside a tokio runtime")]
    NoRuntime,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
