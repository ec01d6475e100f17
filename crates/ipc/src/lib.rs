// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The wire protocol spoken between `bd` and `wokd`: one JSON object per
//! line in each direction over a local stream socket. This crate only
//! defines the envelope and the closed operation catalog; dispatch lives in
//! the daemon, and argument shapes are opaque JSON the two sides agree on
//! out of band (see each `Operation`'s doc comment for its `args` shape).

use std::io::{BufRead, BufReader, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wk_core::{Error, Result};

/// Every request to the daemon names its `operation` with one of these
/// stable string constants. The set is closed: an unrecognized string is a
/// validation error, not a silently-ignored no-op.
pub mod operation {
    pub const PING: &str = "ping";
    pub const STATUS: &str = "status";
    pub const HEALTH: &str = "health";
    pub const METRICS: &str = "metrics";
    pub const SHUTDOWN: &str = "shutdown";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const CLOSE: &str = "close";
    pub const DELETE: &str = "delete";
    pub const LIST: &str = "list";
    pub const COUNT: &str = "count";
    pub const SHOW: &str = "show";
    pub const RESOLVE_ID: &str = "resolve_id";
    pub const READY: &str = "ready";
    pub const BLOCKED: &str = "blocked";
    pub const STALE: &str = "stale";
    pub const STATS: &str = "stats";
    pub const DEP_ADD: &str = "dep_add";
    pub const DEP_REMOVE: &str = "dep_remove";
    pub const DEP_TREE: &str = "dep_tree";
    pub const LABEL_ADD: &str = "label_add";
    pub const LABEL_REMOVE: &str = "label_remove";
    pub const COMMENT_LIST: &str = "comment_list";
    pub const COMMENT_ADD: &str = "comment_add";
    pub const BATCH: &str = "batch";
    pub const COMPACT: &str = "compact";
    pub const COMPACT_STATS: &str = "compact_stats";
    pub const EXPORT: &str = "export";
    pub const IMPORT: &str = "import";
    pub const EPIC_STATUS: &str = "epic_status";
    pub const GET_MUTATIONS: &str = "get_mutations";
    pub const GET_MOLECULE_PROGRESS: &str = "get_molecule_progress";
    pub const GET_WORKER_STATUS: &str = "get_worker_status";
    pub const GET_CONFIG: &str = "get_config";
    pub const MOL_STALE: &str = "mol_stale";
    pub const GATE_CREATE: &str = "gate_create";
    pub const GATE_LIST: &str = "gate_list";
    pub const GATE_SHOW: &str = "gate_show";
    pub const GATE_CLOSE: &str = "gate_close";
    pub const GATE_WAIT: &str = "gate_wait";

    /// Operations exempt from the `expected_db` mismatch check (§4.4 step
    /// 3). `ping` still gets checked — only the two operations that don't
    /// touch a workspace at all skip it.
    pub const DB_CHECK_EXEMPT: &[&str] = &[HEALTH, METRICS];

    /// Operations exempt from the client/server version-compatibility check
    /// (§4.4 step 4). `metrics` still gets checked — only the two
    /// operations a brand-new, possibly-incompatible client needs before it
    /// can even tell whether the server is usable skip it.
    pub const VERSION_CHECK_EXEMPT: &[&str] = &[PING, HEALTH];

    /// Operations that skip the auto-import staleness check (§4.4 step 5).
    pub const SKIPS_AUTO_IMPORT: &[&str] = &[PING, HEALTH, METRICS, EXPORT, IMPORT];

    /// All operations, for validating that a request's `operation` field is
    /// a recognized member of the closed catalog.
    pub const ALL: &[&str] = &[
        PING,
        STATUS,
        HEALTH,
        METRICS,
        SHUTDOWN,
        CREATE,
        UPDATE,
        CLOSE,
        DELETE,
        LIST,
        COUNT,
        SHOW,
        RESOLVE_ID,
        READY,
        BLOCKED,
        STALE,
        STATS,
        DEP_ADD,
        DEP_REMOVE,
        DEP_TREE,
        LABEL_ADD,
        LABEL_REMOVE,
        COMMENT_LIST,
        COMMENT_ADD,
        BATCH,
        COMPACT,
        COMPACT_STATS,
        EXPORT,
        IMPORT,
        EPIC_STATUS,
        GET_MUTATIONS,
        GET_MOLECULE_PROGRESS,
        GET_WORKER_STATUS,
        GET_CONFIG,
        MOL_STALE,
        GATE_CREATE,
        GATE_LIST,
        GATE_SHOW,
        GATE_CLOSE,
        GATE_WAIT,
    ];

    pub fn is_known(op: &str) -> bool {
        ALL.contains(&op)
    }
}

/// One request frame: `operation` plus opaque `args`, with the context the
/// validation pipeline needs before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub operation: String,
    #[serde(default = "default_args")]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_db: Option<String>,
}

fn default_args() -> Value {
    Value::Null
}

impl Request {
    pub fn new(operation: impl Into<String>, args: Value) -> Self {
        Request {
            operation: operation.into(),
            args,
            actor: None,
            request_id: None,
            cwd: None,
            client_version: None,
            expected_db: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_expected_db(mut self, path: impl Into<String>) -> Self {
        self.expected_db = Some(path.into());
        self
    }
}

/// One response frame. `data` is present on success when the operation
/// returns a payload; `error` is present on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Response {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn ok_empty() -> Self {
        Response {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Response {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Reads one line-delimited JSON [`Request`] from `reader`. Returns `Ok(None)`
/// at a clean EOF (the peer closed the connection between requests).
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Option<Request>> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Ok(None);
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let request: Request = serde_json::from_str(trimmed)?;
    Ok(Some(request))
}

/// Writes one line-delimited JSON [`Response`] to `writer` and flushes.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let json = serde_json::to_string(response)?;
    writeln!(writer, "{json}")?;
    writer.flush()?;
    Ok(())
}

/// Writes one line-delimited JSON [`Request`] to `writer` and flushes.
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let json = serde_json::to_string(request)?;
    writeln!(writer, "{json}")?;
    writer.flush()?;
    Ok(())
}

/// Reads one line-delimited JSON [`Response`] from `reader`.
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Err(Error::Daemon("connection closed before response".into()));
    }
    let response: Response = serde_json::from_str(line.trim())?;
    Ok(response)
}

/// Convenience wrapper: send `request` over `stream` and block for its
/// response, using one buffered reader/writer pair.
pub fn call<S: std::io::Read + std::io::Write>(stream: &mut S, request: &Request) -> Result<Response> {
    write_request(stream, request)?;
    let mut reader = BufReader::new(stream);
    read_response(&mut reader)
}

/// The semver compatibility rule from §4.4 step 4: same major required;
/// a server whose minor is older than the client's refuses with an upgrade
/// message, while an older client on the same major is always permitted.
pub fn check_version_compat(client_version: &str, server_version: &str) -> Result<()> {
    let client = parse_semver(client_version)?;
    let server = parse_semver(server_version)?;
    if client.0 != server.0 {
        return Err(Error::VersionMismatch {
            client: client_version.to_string(),
            server: server_version.to_string(),
        });
    }
    if server.1 < client.1 {
        return Err(Error::VersionMismatch {
            client: client_version.to_string(),
            server: server_version.to_string(),
        });
    }
    Ok(())
}

fn parse_semver(version: &str) -> Result<(u64, u64, u64)> {
    let mut parts = version.trim_start_matches('v').split('.');
    let parse_part = |p: Option<&str>| -> Result<u64> {
        p.and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::InvalidInput(format!("invalid semver: '{version}'")))
    };
    let major = parse_part(parts.next())?;
    let minor = parse_part(parts.next())?;
    let patch = parse_part(parts.next().or(Some("0")))?;
    Ok((major, minor, patch))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
