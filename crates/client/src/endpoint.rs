// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoint selection with failover cooldown.
//!
//! The registry owns the ordered endpoint list and the index of the one in
//! use. Switches are rate limited by a cooldown, and the selection is
//! written to disk so a restart resumes on the same server.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lx_core::ClockSource;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ConfigError, Endpoint};

/// Filename for the persisted endpoint selection.
pub const SELECTION_FILE: &str = "endpoint.json";

/// Persisted selection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub index: usize,
    pub last_switch_ms: Option<u64>,
}

/// Reads and writes the selection file.
#[derive(Debug, Clone)]
pub struct SelectionPersistence {
    path: PathBuf,
}

impl SelectionPersistence {
    pub fn new(state_dir: &Path) -> Self {
        SelectionPersistence {
            path: state_dir.join(SELECTION_FILE),
        }
    }

    /// Read the selection, returns None if the file doesn't exist or is invalid.
    pub fn read(&self) -> Option<Selection> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Write the selection to disk with fsync for durability.
    pub fn write(&self, selection: &Selection) -> std::io::Result<()> {
        use std::io::Write;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(selection)?;
        let mut file = std::fs::File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

/// Ordered endpoint list and current selection.
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
    cooldown_ms: u64,
    clock: Arc<dyn ClockSource>,
    persistence: Option<SelectionPersistence>,
    selection: Mutex<Selection>,
}

impl EndpointRegistry {
    /// Create a registry without persistence.
    pub fn new(
        endpoints: Vec<Endpoint>,
        cooldown_ms: u64,
        clock: Arc<dyn ClockSource>,
    ) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one endpoint is required".to_string(),
            ));
        }
        Ok(EndpointRegistry {
            endpoints,
            cooldown_ms,
            clock,
            persistence: None,
            selection: Mutex::new(Selection::default()),
        })
    }

    /// Attach persistence and restore a previously saved selection.
    ///
    /// A saved index that no longer fits the endpoint list is ignored.
    pub fn with_persistence(mut self, persistence: SelectionPersistence) -> Self {
        if let Some(saved) = persistence.read() {
            if saved.index < self.endpoints.len() {
                *self.selection.get_mut().unwrap_or_else(|e| e.into_inner()) = saved;
            } else {
                warn!(
                    index = saved.index,
                    endpoints = self.endpoints.len(),
                    "ignoring out-of-range saved endpoint"
                );
            }
        }
        self.persistence = Some(persistence);
        self
    }

    /// The endpoint currently in use.
    pub fn current(&self) -> Endpoint {
        let index = self.index();
        self.endpoints[index].clone()
    }

    pub fn index(&self) -> usize {
        self.selection.lock().unwrap_or_else(|e| e.into_inner()).index
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Advance to the next endpoint, round robin.
    ///
    /// Returns false if the previous switch happened within the cooldown, or
    /// if there is nothing to switch to.
    pub fn switch_next(&self) -> bool {
        if self.endpoints.len() < 2 {
            return false;
        }
        let now = self.clock.now_ms();
        let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = selection.last_switch_ms {
            if now.saturating_sub(last) < self.cooldown_ms {
                return false;
            }
        }
        let from = selection.index;
        selection.index = (from + 1) % self.endpoints.len();
        selection.last_switch_ms = Some(now);
        info!(
            from = %self.endpoints[from].name,
            to = %self.endpoints[selection.index].name,
            "switched endpoint"
        );
        self.persist(&selection);
        true
    }

    /// Select the first endpoint flagged primary. No-op if it is already
    /// selected or none is flagged. Returns true if the selection changed.
    pub fn switch_to_primary(&self) -> bool {
        let Some(primary) = self.endpoints.iter().position(|e| e.is_primary) else {
            return false;
        };
        let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        if selection.index == primary {
            return false;
        }
        selection.index = primary;
        selection.last_switch_ms = Some(self.clock.now_ms());
        info!(to = %self.endpoints[primary].name, "switched to primary endpoint");
        self.persist(&selection);
        true
    }

    /// Back to the first endpoint with no cooldown in effect.
    pub fn reset(&self) {
        let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        *selection = Selection::default();
        self.persist(&selection);
    }

    fn persist(&self, selection: &Selection) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.write(selection) {
                warn!(error = %e, "failed to persist endpoint selection");
            }
        }
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("endpoints", &self.endpoints)
            .field("selection", &*self.selection.lock().unwrap_or_else(|e| e.into_inner()))
            .finish()
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
