// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The client half of §4.4's RPC protocol: finds (or forks) the workspace's
//! daemon and sends one request per call. This is the thin thing `bd` does
//! instead of owning the store directly — every mutating or query
//! subcommand is a `Request` over this connection.

use std::io::{BufReader, Read};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde_json::Value;
use wk_core::{get_user_name, Error, Result};
use wk_ipc::{Request, Response};

use crate::{registry, workspace};

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A bound connection to one workspace's daemon, dialing (and forking the
/// daemon if necessary) on construction so every subcommand pays that cost
/// at most once.
pub struct Client {
    workspace_root: PathBuf,
    socket_path: PathBuf,
    actor: String,
}

impl Client {
    /// Resolves the workspace containing `cwd`, finds or starts its daemon,
    /// and returns a handle ready to send requests.
    pub fn connect(cwd: &Path) -> Result<Self> {
        let workspace_root = workspace::find_workspace_root(cwd);
        let socket_path = find_or_spawn_daemon(&workspace_root)?;
        Ok(Client {
            workspace_root,
            socket_path,
            actor: get_user_name(),
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Sends `operation` with `args` and returns the response's `data`
    /// (or an error built from the response's `error` string).
    pub fn call(&self, operation: &str, args: Value) -> Result<Value> {
        let mut request = Request::new(operation, args)
            .with_actor(self.actor.clone())
            .with_expected_db(workspace::database_path(&self.workspace_root).display().to_string());
        request.client_version = Some(CLIENT_VERSION.to_string());
        request.cwd = Some(self.workspace_root.display().to_string());

        let stream = dial(&self.socket_path)?;
        let mut write_half = stream.try_clone().map_err(Error::Io)?;
        wk_ipc::write_request(&mut write_half, &request)?;

        let mut reader = BufReader::new(stream);
        let response = wk_ipc::read_response(&mut reader)?;
        into_result(response)
    }
}

fn into_result(response: Response) -> Result<Value> {
    if response.success {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(Error::Daemon(response.error.unwrap_or_else(|| "unknown daemon error".to_string())))
    }
}

fn dial(socket_path: &Path) -> Result<UnixStream> {
    UnixStream::connect(socket_path).map_err(Error::Io)
}

/// Tries the short socket path, then the legacy in-workspace path, then
/// scans the global registry for an entry already registered for this
/// workspace (§4.6 steps 1-3); only once all three fail to answer a `ping`
/// does it fork `wokd` and wait for it to come up.
fn find_or_spawn_daemon(workspace_root: &Path) -> Result<PathBuf> {
    let short = workspace::short_socket_path(workspace_root);
    if ping(&short) {
        return Ok(short);
    }
    let legacy = workspace::legacy_socket_path(workspace_root);
    if ping(&legacy) {
        return Ok(legacy);
    }

    if let Some(entry) = registry::find_for_workspace(workspace_root) {
        let candidate = PathBuf::from(&entry.socket_path);
        if ping(&candidate) {
            return Ok(candidate);
        }
        // The registry says a daemon is live but its socket didn't answer.
        // Clean up whatever a crashed daemon left behind, if nothing still
        // holds the workspace lock; otherwise a daemon is genuinely mid
        // start or mid shutdown and we just fall through to spawn/wait.
        cleanup_stale(workspace_root, &candidate);
    } else {
        cleanup_stale(workspace_root, &short);
    }

    spawn_daemon(workspace_root)?;
    wait_for_socket(&short, Duration::from_secs(5))
}

fn ping(socket_path: &Path) -> bool {
    UnixStream::connect(socket_path).is_ok()
}

/// Removes a stale `daemon.pid` file and, if present, a stale socket file,
/// but only when the per-workspace advisory lock is free — i.e. only when
/// no daemon process actually holds this workspace open (§4.6's stale-
/// socket heuristic). If the lock is held, a daemon is genuinely running
/// (or starting up) and nothing here is touched.
fn cleanup_stale(workspace_root: &Path, socket_path: &Path) {
    let beads_dir = workspace_root.join(".beads");
    let lock_path = beads_dir.join("daemon.lock");
    let Ok(lock_file) = std::fs::OpenOptions::new().create(true).write(true).truncate(false).open(&lock_path) else {
        return;
    };
    if lock_file.try_lock_exclusive().is_err() {
        return;
    }
    let _ = lock_file.unlock();

    let _ = std::fs::remove_file(beads_dir.join("daemon.pid"));
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
}

fn wait_for_socket(socket_path: &Path, timeout: Duration) -> Result<PathBuf> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if ping(socket_path) {
            return Ok(socket_path.to_path_buf());
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    Err(Error::Daemon(format!(
        "daemon did not come up at {} within {:?}",
        socket_path.display(),
        timeout
    )))
}

/// Forks `wokd --workspace <root>` detached from this process, looking for
/// the binary next to our own executable first (so a workspace-local
/// install doesn't need `wokd` on `PATH`), then falling back to `PATH`.
fn spawn_daemon(workspace_root: &Path) -> Result<()> {
    let bin = daemon_binary_path();
    let mut child = Command::new(bin)
        .arg("--workspace")
        .arg(workspace_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::Daemon(format!("failed to start wokd: {e}")))?;

    // Block until the daemon prints its READY line or exits, so the caller
    // never races the socket bind.
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut buf = [0u8; 1];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if buf[0] == b'\n' {
                        if line.trim() == "READY" {
                            break;
                        }
                        line.clear();
                    } else {
                        line.push(buf[0] as char);
                    }
                }
                Err(_) => break,
            }
        }
    }
    Ok(())
}

fn daemon_binary_path() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("wokd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("wokd")
}
