// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-side access to the global daemon registry (`~/.beads/registry.json`)
//! used by discovery's third fallback (§4.6 step 3): scan the registry for
//! an entry whose canonicalised workspace path matches this one, after the
//! short and legacy socket paths have both failed to answer a ping.
//!
//! This duplicates the daemon crate's own `registry.rs` file format and
//! locking discipline rather than depending on it as a library, for the
//! same reason `workspace.rs` duplicates the socket-path hash: `wokd` has
//! no `[lib]` target to share code from.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    pub workspace_path: String,
    pub socket_path: String,
    #[allow(dead_code)]
    pub pid: u32,
    #[allow(dead_code)]
    pub version: String,
    #[allow(dead_code)]
    pub started_at: DateTime<Utc>,
}

/// The registry home: `BEADS_STATE_DIR`, then `XDG_STATE_HOME/beads`, then
/// `~/.beads`, matching the daemon's own `default_state_dir`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BEADS_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(dir).join("beads");
    }
    dirs::home_dir().map(|h| h.join(".beads")).unwrap_or_else(|| PathBuf::from(".beads"))
}

/// Finds the registry entry for `workspace_root`, after canonicalising both
/// sides. Returns `None` on any I/O or parse failure — a missing or
/// corrupt registry is just "no entry found", not an error worth
/// surfacing to a caller that's about to fall back to spawning anyway.
pub fn find_for_workspace(workspace_root: &Path) -> Option<RegistryEntry> {
    let canonical = workspace_root.canonicalize().unwrap_or_else(|_| workspace_root.to_path_buf());
    let path = state_dir().join("registry.json");
    let lock_path = state_dir().join("registry.lock");

    let lock_file = fs::OpenOptions::new().create(true).write(true).truncate(false).open(&lock_path).ok()?;
    lock_file.lock_shared().ok()?;
    let contents = fs::read_to_string(&path);
    let _ = lock_file.unlock();
    let contents = contents.ok()?;
    if contents.trim().is_empty() {
        return None;
    }
    let entries: Vec<RegistryEntry> = serde_json::from_str(&contents).ok()?;
    entries.into_iter().find(|e| {
        let other = PathBuf::from(&e.workspace_path);
        let other_canonical = other.canonicalize().unwrap_or(other);
        paths_equal(&canonical, &other_canonical)
    })
}

#[cfg(unix)]
fn paths_equal(a: &Path, b: &Path) -> bool {
    a == b
}

#[cfg(not(unix))]
fn paths_equal(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
