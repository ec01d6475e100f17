// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable names and the daemon's tunables that read them.
//!
//! Precedence for `BEADS_*` values is flag > env > config file > default;
//! this module only owns the env layer. Names are generated by `build.rs`
//! into a single source of truth so a rename can't drift between the
//! constant and its usage.

use std::path::PathBuf;
use std::time::Duration;

pub mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

/// Explicit override for the state directory that holds the registry,
/// per-workspace daemon.pid/lock files, and logs.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(names::BEADS_STATE_DIR).ok().map(PathBuf::from)
}

pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(names::XDG_STATE_HOME).ok().map(PathBuf::from)
}

/// `BEADS_DAEMON_MAX_CONNS`, default 100.
pub fn max_conns() -> usize {
    parse_or_default(names::BEADS_DAEMON_MAX_CONNS, 100)
}

/// `BEADS_DAEMON_REQUEST_TIMEOUT`, seconds, default 30.
pub fn request_timeout() -> Duration {
    Duration::from_secs(parse_or_default(names::BEADS_DAEMON_REQUEST_TIMEOUT, 30))
}

/// `BEADS_MUTATION_BUFFER`, default 512.
pub fn mutation_buffer() -> usize {
    parse_or_default(names::BEADS_MUTATION_BUFFER, 512)
}

/// `BD_RPC_DEBUG`, 0/1 switch for verbose request/response logging.
pub fn rpc_debug() -> bool {
    std::env::var(names::BD_RPC_DEBUG)
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// `GT_ROOT`, optional orchestrator root for molecule templates.
pub fn gt_root() -> Option<PathBuf> {
    std::env::var(names::GT_ROOT).ok().map(PathBuf::from)
}

/// `ANTHROPIC_API_KEY`, for the summarisation/compaction collaborator.
pub fn anthropic_api_key() -> Option<String> {
    std::env::var(names::ANTHROPIC_API_KEY).ok()
}

fn parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
