// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Socket path resolution (§6). The Unix socket path limit is ~103 bytes on
//! some platforms, so the primary path lives outside the workspace, keyed
//! by a short hash of the workspace root; a legacy in-workspace path is
//! tried second for backward compatibility with older workspaces.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// The primary short socket path: `${tmpdir}/beads-<8-hex-hash>/bd.sock`.
/// The hash is SHA-256 of the canonical workspace path, truncated to 4
/// bytes and hex-encoded (8 hex characters).
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

/// The legacy in-workspace socket path, tried second by discovery (§4.6).
pub fn legacy_socket_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".beads").join("bd.sock")
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
