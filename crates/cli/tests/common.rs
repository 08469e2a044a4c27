// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

pub fn lx() -> Command {
    cargo_bin_cmd!("lx")
}

/// Write a config pointing at an unreachable local endpoint, with the state
/// directory inside `temp`. Returns the config path.
pub fn write_config(temp: &TempDir) -> PathBuf {
    write_config_with(
        temp,
        "ws://127.0.0.1:9/ws",
        "http://127.0.0.1:9/api/v1",
    )
}

pub fn write_config_with(temp: &TempDir, transport_url: &str, api_url: &str) -> PathBuf {
    let state_dir = temp.path().join("state");
    let content = format!(
        "token = \"tok\"\n\
         state_dir = '{}'\n\
         \n\
         [[endpoints]]\n\
         name = \"local\"\n\
         transport_url = \"{}\"\n\
         api_url = \"{}\"\n\
         is_primary = true\n",
        state_dir.display(),
        transport_url,
        api_url,
    );
    let path = temp.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}
