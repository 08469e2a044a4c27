// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors reported by the `lx` command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] lx_client::Error),

    #[error(transparent)]
    Config(#[from] lx_client::ConfigError),

    #[error(transparent)]
    Store(#[from] lx_core::Error),

    #[error("no config file given and no default location\n  hint: pass --config <path>")]
    NoConfigPath,

    #[error("no state directory available\n  hint: set state_dir in the config")]
    NoStateDir,

    #[error("message {correlation_id} failed: {reason}")]
    SendFailed {
        correlation_id: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
