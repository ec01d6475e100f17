// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for beads-core operations.

use thiserror::Error;

/// All possible errors that can occur in beads-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("issue not found: {0}")]
    IssueNotFound(String),

    #[error("ambiguous id prefix '{0}' matches multiple issues: {1:?}")]
    AmbiguousId(String, Vec<String>),

    #[error("invalid issue id: '{0}'\n  hint: ids are <prefix>-<suffix> where suffix is a base-36 hash, legacy decimal, or dot-path")]
    InvalidId(String),

    #[error("invalid status: '{0}'\n  hint: valid statuses are: open, in_progress, blocked, closed, tombstone")]
    InvalidStatus(String),

    #[error("invalid issue type: '{0}'")]
    InvalidIssueType(String),

    #[error("invalid dependency type: '{0}'\n  hint: valid types are: blocks, parent-child, related, duplicates")]
    InvalidDependencyType(String),

    #[error("cannot close {id}: blocked by open issue(s) {blockers:?}\n  hint: pass force=true to override")]
    BlockedClose { id: String, blockers: Vec<String> },

    #[error("already claimed by {0}")]
    AlreadyClaimed(String),

    #[error("cannot create self-dependency")]
    SelfDependency,

    #[error("would create a dependency cycle")]
    CycleDetected,

    #[error("dependency not found: {from} -> {to} ({rel})")]
    DependencyNotFound {
        from: String,
        to: String,
        rel: String,
    },

    #[error("{0}")]
    InvalidInput(String),

    #[error("database mismatch: expected {expected}, server is bound to {actual}")]
    DatabaseMismatch { expected: String, actual: String },

    #[error("client version {client} is incompatible with server version {server}\n  hint: upgrade your client")]
    VersionMismatch { client: String, server: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("lock held by another process: {0}")]
    LockContention(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("daemon error: {0}")]
    Daemon(String),
}

/// A specialized Result type for beads-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
