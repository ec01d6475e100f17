// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The global daemon registry: `~/.beads/registry.json`, a JSON array of
//! `{workspace_path, socket_path, database_path, pid, version, started_at}`
//! entries, one per live daemon on this machine. Cross-process safety comes
//! from an exclusive advisory lock on a sibling `registry.lock` file plus
//! an in-process mutex; corrupted or empty files are treated as empty so a
//! half-written registry never wedges every daemon on the host.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use wk_core::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    pub workspace_path: String,
    pub socket_path: String,
    pub database_path: String,
    pub pid: u32,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

/// Process-wide lock guarding concurrent registry mutation from this
/// process; the OS advisory lock on `registry.lock` guards other processes.
static REGISTRY_MUTEX: Mutex<()> = Mutex::new(());

/// A handle to the registry file pair, rooted at `~/.beads` (or
/// `BEADS_STATE_DIR` if the caller passes an override).
pub struct Registry {
    path: PathBuf,
    lock_path: PathBuf,
}

impl Registry {
    pub fn at(beads_home: &Path) -> Self {
        Registry {
            path: beads_home.join("registry.json"),
            lock_path: beads_home.join("registry.lock"),
        }
    }

    fn read_unlocked(&self) -> Vec<RegistryEntry> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        if contents.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn write_unlocked(&self, entries: &[RegistryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn with_lock<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let _process_guard = REGISTRY_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_file = open_lock_file(&self.lock_path)?;
        lock_file.lock_exclusive()?;
        let result = f(self);
        let _ = lock_file.unlock();
        result
    }

    /// Adds or replaces the entry for `entry.workspace_path`, pruning dead
    /// processes from the registry in the same write.
    pub fn register(&self, entry: RegistryEntry) -> Result<()> {
        self.with_lock(|registry| {
            let mut entries = registry.read_unlocked();
            entries.retain(|e| e.workspace_path != entry.workspace_path && process_is_alive(e.pid));
            entries.push(entry);
            registry.write_unlocked(&entries)
        })
    }

    pub fn deregister(&self, workspace_path: &str) -> Result<()> {
        self.with_lock(|registry| {
            let mut entries = registry.read_unlocked();
            entries.retain(|e| e.workspace_path != workspace_path);
            registry.write_unlocked(&entries)
        })
    }

    /// All entries whose pid is still alive; dead ones are swept from the
    /// file as a side effect.
    pub fn list_live(&self) -> Result<Vec<RegistryEntry>> {
        self.with_lock(|registry| {
            let entries = registry.read_unlocked();
            let (live, dead): (Vec<_>, Vec<_>) =
                entries.into_iter().partition(|e| process_is_alive(e.pid));
            if !dead.is_empty() {
                registry.write_unlocked(&live)?;
            }
            Ok(live)
        })
    }

    /// Finds the entry for `workspace_path` after canonicalising both
    /// sides, case-insensitively where the filesystem warrants it.
    pub fn find(&self, workspace_path: &Path) -> Result<Option<RegistryEntry>> {
        let canonical = workspace_path
            .canonicalize()
            .unwrap_or_else(|_| workspace_path.to_path_buf());
        let entries = self.list_live()?;
        Ok(entries.into_iter().find(|e| {
            let other = PathBuf::from(&e.workspace_path);
            let other_canonical = other.canonicalize().unwrap_or(other);
            paths_equal(&canonical, &other_canonical)
        }))
    }
}

#[cfg(unix)]
fn paths_equal(a: &Path, b: &Path) -> bool {
    a == b
}

#[cfg(not(unix))]
fn paths_equal(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
}

fn open_lock_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).write(true).truncate(false).open(path)?)
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // `kill -0` sends no signal but still reports failure if the pid is
    // gone; shelling out avoids reaching for unsafe FFI for one syscall.
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
