// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The per-workspace single-writer lock (§5): `<beads_dir>/daemon.lock`,
//! distinct from the global `registry.lock` that serializes access to the
//! shared registry file. Held for the daemon process's entire lifetime.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use wk_core::{Error, Result};

/// Filename of the per-workspace lock, sibling to the SQLite database.
pub const LOCK_NAME: &str = "daemon.lock";

/// Acquires the exclusive workspace lock, failing immediately (no blocking)
/// if another daemon already holds it.
pub fn acquire(beads_dir: &Path) -> Result<File> {
    fs::create_dir_all(beads_dir)?;
    let path = beads_dir.join(LOCK_NAME);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)?;
    file.try_lock_exclusive().map_err(|_| {
        Error::LockContention(format!(
            "another daemon already holds {}",
            path.display()
        ))
    })?;
    Ok(file)
}

#[cfg(test)]
#[path = "lockfile_tests.rs"]
mod tests;
