// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::error::Result;

pub fn run(path: Option<&Path>) -> Result<()> {
    let config = super::load_config(path)?;
    println!("config OK: {} endpoint(s)", config.endpoints.len());
    for endpoint in &config.endpoints {
        let marker = if endpoint.is_primary { " (primary)" } else { "" };
        println!(
            "  {}{}: {} | {}",
            endpoint.name, marker, endpoint.transport_url, endpoint.api_url
        );
    }
    if let Some(dir) = config.state_dir() {
        println!("state dir: {}", dir.display());
    }
    Ok(())
}
