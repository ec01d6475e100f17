// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace resolution: finding the `.beads` directory that owns the
//! current directory, and the two candidate socket paths (§4.6, §6) a
//! client tries before falling back to the registry.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Walks up from `start` looking for a `.beads` directory, returning the
/// directory that contains it (the workspace root). Falls back to `start`
/// itself if none is found, matching `bd init`'s convention of creating
/// `.beads` lazily on first use.
pub fn find_workspace_root(start: &Path) -> PathBuf {
    let mut dir = start;
    loop {
        if dir.join(".beads").is_dir() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return start.to_path_buf(),
        }
    }
}

/// The primary short socket path: `${tmpdir}/beads-<8-hex-hash>/bd.sock`.
/// Mirrors `wokd`'s own `socket::short_socket_path` so the client can find
/// a daemon without talking to it first.
pub fn short_socket_path(workspace_root: &Path) -> PathBuf {
    let canonical = workspace_root
        .canonicalize()
        .unwrap_or_else(|_| workspace_root.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hash = hex::encode(&digest[..4]);
    std::env::temp_dir()
        .join(format!("beads-{hash}"))
        .join("bd.sock")
}

/// The legacy in-workspace socket path, tried second (§4.6).
pub fn legacy_socket_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".beads").join("bd.sock")
}

pub fn database_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".beads").join("issues.db")
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
