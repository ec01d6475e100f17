// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The connection loop (§4.4, §5): one OS thread per accepted connection,
//! bounded by a connection-cap semaphore, over a blocking `UnixListener`.
//! Each request runs the seven-step validation pipeline before dispatch;
//! `handlers::dispatch` never sees the wire format.

use std::io::BufReader;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use wk_core::Store;
use wk_ipc::{operation, Request, Response};

use crate::autoimport::AutoImportGate;
use crate::handlers::{self, HandlerContext};
use crate::mutation::MutationBus;

/// Tunables the server reads once at startup (§6's environment variables).
pub struct ServerConfig {
    pub max_conns: usize,
    pub request_timeout: Duration,
    pub mutation_buffer: usize,
}

/// Everything request handling needs that outlives any single connection.
/// Shared across threads behind `Arc`; the store itself is behind a mutex
/// because a workspace has exactly one writer of record (§5) and several of
/// its methods take `&mut self`.
struct Shared {
    store: Mutex<Store>,
    prefix: String,
    database_path: String,
    text_path: PathBuf,
    mutations: MutationBus,
    autoimport: AutoImportGate,
    server_version: String,
    started_at: chrono::DateTime<Utc>,
    last_activity_ms: AtomicI64,
    active_conns: AtomicUsize,
    max_conns: usize,
    request_timeout: Duration,
    shutting_down: AtomicBool,
}

/// A running server: owns the listener thread and the set of per-connection
/// threads spawned so far. `stop` is idempotent (§4.4's shutdown semantics).
pub struct Server {
    shared: Arc<Shared>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Binds `socket_path` (removing a stale socket file first) and starts
    /// accepting connections in a background thread.
    pub fn start(
        socket_path: &Path,
        database_path: String,
        text_path: PathBuf,
        prefix: String,
        server_version: String,
        config: ServerConfig,
    ) -> wk_core::Result<Self> {
        let store = Store::open(Path::new(&database_path))?;
        let shared = Arc::new(Shared {
            store: Mutex::new(store),
            prefix,
            database_path,
            text_path,
            mutations: MutationBus::new(config.mutation_buffer),
            autoimport: AutoImportGate::new(),
            server_version,
            started_at: Utc::now(),
            last_activity_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            active_conns: AtomicUsize::new(0),
            max_conns: config.max_conns,
            request_timeout: config.request_timeout,
            shutting_down: AtomicBool::new(false),
        });

        let _ = std::fs::remove_file(socket_path);
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;

        let accept_shared = Arc::clone(&shared);
        let accept_thread = std::thread::spawn(move || accept_loop(listener, accept_shared));

        Ok(Server {
            shared,
            accept_thread: Some(accept_thread),
        })
    }

    /// Requests shutdown and blocks until the accept loop and every
    /// in-flight connection thread have drained. Safe to call more than
    /// once; the second call is a no-op.
    pub fn stop(&mut self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        self.join();
    }

    /// Blocks until the server stops on its own — via an RPC `shutdown`
    /// request — without requesting shutdown itself. Safe to call more than
    /// once.
    pub fn join(&mut self) {
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }

    pub fn dropped_mutations(&self) -> u64 {
        self.shared.mutations.dropped_count()
    }

    /// Milliseconds since the epoch of the most recently dispatched request.
    pub fn last_activity_ms(&self) -> i64 {
        self.shared.last_activity_ms.load(Ordering::SeqCst)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn accept_loop(listener: UnixListener, shared: Arc<Shared>) {
    let mut conn_threads: Vec<JoinHandle<()>> = Vec::new();
    loop {
        if shared.shutting_down.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                if shared.active_conns.load(Ordering::SeqCst) >= shared.max_conns {
                    // Over the connection cap: close immediately rather than
                    // queue (§4.4 step 1).
                    drop(stream);
                    continue;
                }
                shared.active_conns.fetch_add(1, Ordering::SeqCst);
                let conn_shared = Arc::clone(&shared);
                conn_threads.push(std::thread::spawn(move || {
                    handle_connection(stream, &conn_shared);
                    conn_shared.active_conns.fetch_sub(1, Ordering::SeqCst);
                }));
                conn_threads.retain(|h| !h.is_finished());
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                tracing::warn!("failed to accept connection: {e}");
            }
        }
    }
    for handle in conn_threads {
        let _ = handle.join();
    }
}

/// Serves one connection: requests are serialized within it (one line in,
/// one line out), matching the per-connection ordering guarantee (§5).
fn handle_connection(stream: UnixStream, shared: &Shared) {
    let _ = stream.set_read_timeout(Some(shared.request_timeout));
    let _ = stream.set_write_timeout(Some(shared.request_timeout));
    let mut writer = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("failed to clone connection stream: {e}");
            return;
        }
    };
    let mut reader = BufReader::new(stream);

    loop {
        let request = match wk_ipc::read_request(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                let _ = wk_ipc::write_response(&mut writer, &Response::err(e.to_string()));
                return;
            }
        };

        let response = handle_request(&request, shared);
        let shutdown_requested = request.operation == operation::SHUTDOWN && response.success;
        if wk_ipc::write_response(&mut writer, &response).is_err() {
            return;
        }
        if shutdown_requested {
            shared.shutting_down.store(true, Ordering::SeqCst);
            return;
        }
    }
}

/// Runs the validation pipeline (§4.4 steps 3-7) and dispatches.
fn handle_request(request: &Request, shared: &Shared) -> Response {
    let span = tracing::debug_span!("rpc", operation = %request.operation, actor = request.actor.as_deref().unwrap_or("unknown"));
    let _enter = span.enter();
    let started = std::time::Instant::now();

    if !operation::is_known(&request.operation) {
        return Response::err(format!("unknown operation: {}", request.operation));
    }

    if !operation::DB_CHECK_EXEMPT.contains(&request.operation.as_str()) {
        if let Some(expected) = &request.expected_db {
            if let Err(e) = check_expected_db(expected, &shared.database_path) {
                return Response::err(e.to_string());
            }
        }
    }
    if !operation::VERSION_CHECK_EXEMPT.contains(&request.operation.as_str()) {
        if let Some(client_version) = &request.client_version {
            if let Err(e) = wk_ipc::check_version_compat(client_version, &shared.server_version) {
                return Response::err(e.to_string());
            }
        }
    }

    let result = if request.operation == operation::GATE_WAIT {
        poll_gate(request, shared)
    } else {
        dispatch_once(request, shared)
    };

    let elapsed = started.elapsed();
    match result {
        Ok(data) => {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "request ok");
            Response::ok(data)
        }
        Err(e) => {
            tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, error = %e, "request failed");
            Response::err(e.to_string())
        }
    }
}

/// Locks the store for exactly one dispatch and releases it, matching the
/// per-request locking every other operation gets.
fn dispatch_once(request: &Request, shared: &Shared) -> wk_core::Result<serde_json::Value> {
    let mut store = match shared.store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if !operation::SKIPS_AUTO_IMPORT.contains(&request.operation.as_str()) {
        shared
            .autoimport
            .maybe_import(&mut store, &shared.text_path, &shared.prefix, &shared.mutations);
    }

    shared.last_activity_ms.store(Utc::now().timestamp_millis(), Ordering::SeqCst);

    let actor = request.actor.clone().unwrap_or_else(|| "unknown".to_string());
    let mut ctx = HandlerContext {
        store: &mut store,
        prefix: &shared.prefix,
        text_path: &shared.text_path,
        mutations: &shared.mutations,
        server_version: &shared.server_version,
        started_at: shared.started_at,
    };
    handlers::dispatch(&request.operation, request.args.clone(), &actor, &mut ctx)
}

const GATE_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// `gate_wait` blocks the calling connection, not the daemon: it re-runs
/// `gate_show` on its own interval, releasing the store lock between polls
/// so every other connection keeps making progress, until the gate closes
/// or the request timeout elapses. The last snapshot observed is returned
/// either way, so a caller that times out still sees the gate's current
/// state rather than an error.
fn poll_gate(request: &Request, shared: &Shared) -> wk_core::Result<serde_json::Value> {
    let show_request = Request {
        operation: operation::GATE_SHOW.to_string(),
        ..request.clone()
    };

    let deadline = std::time::Instant::now() + shared.request_timeout;
    loop {
        let data = dispatch_once(&show_request, shared)?;
        let closed = data
            .get("issue")
            .and_then(|issue| issue.get("status"))
            .and_then(|status| status.as_str())
            .map(|status| status == "closed")
            .unwrap_or(false);

        if closed || std::time::Instant::now() >= deadline {
            return Ok(data);
        }
        std::thread::sleep(GATE_WAIT_POLL_INTERVAL.min(deadline.saturating_duration_since(std::time::Instant::now())));
    }
}

fn check_expected_db(expected: &str, actual: &str) -> wk_core::Result<()> {
    let expected_path = PathBuf::from(expected);
    let actual_path = PathBuf::from(actual);
    let expected_canonical = expected_path.canonicalize().unwrap_or(expected_path);
    let actual_canonical = actual_path.canonicalize().unwrap_or(actual_path);
    if expected_canonical != actual_canonical {
        return Err(wk_core::Error::DatabaseMismatch {
            expected: expected_canonical.display().to_string(),
            actual: actual_canonical.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
