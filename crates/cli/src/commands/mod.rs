// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod check_config;
pub mod history;
pub mod run;
pub mod send;

use std::path::Path;

use lx_client::config::default_config_path;
use lx_client::ClientConfig;

use crate::error::{Error, Result};

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path().ok_or(Error::NoConfigPath)?,
    };
    Ok(ClientConfig::load(&path)?)
}
