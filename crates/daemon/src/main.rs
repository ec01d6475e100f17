// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! wokd - the per-workspace sync daemon.
//!
//! Owns one workspace's SQLite store and serves it over a local Unix socket
//! to `bd` CLI processes (§4.4). Usage:
//!
//!   wokd --workspace <path> [--state-dir <path>]
//!
//! `--workspace` defaults to the current directory; `--state-dir` overrides
//! where the global registry and this daemon's log file live (default
//! `~/.beads`).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

mod autoimport;
mod env;
mod handlers;
mod lockfile;
mod mutation;
mod registry;
mod server;
mod socket;

use registry::{Registry, RegistryEntry};
use server::{Server, ServerConfig};
use wk_core::{Store, WorkspaceConfig};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let workspace_root = parse_workspace(&args);
    let state_dir = parse_state_dir(&args).unwrap_or_else(default_state_dir);

    setup_logging(&state_dir.join("daemon.log"));
    tracing::info!("wokd {SERVER_VERSION} starting for workspace {}", workspace_root.display());

    if let Err(e) = run(&workspace_root, &state_dir) {
        tracing::error!("wokd exiting: {e}");
        let _ = fs::write(workspace_root.join(".beads").join("daemon-error"), e.to_string());
        std::process::exit(1);
    }
}

fn run(workspace_root: &Path, state_dir: &Path) -> wk_core::Result<()> {
    let beads_dir = workspace_root.join(".beads");
    fs::create_dir_all(&beads_dir)?;

    let config = WorkspaceConfig::load(&beads_dir)?;
    let _lock = lockfile::acquire(&beads_dir)?;

    let database_path = beads_dir.join("issues.db");
    let text_path = workspace_root.join("issues.jsonl");
    let socket_path = socket::short_socket_path(workspace_root);

    // Ensure the schema exists and seed the store's own config key-space
    // from the file-backed config, then drop the handle; `Server::start`
    // reopens it under its own mutex.
    {
        let store = Store::open(&database_path)?;
        store.set_config("molecule_stale_days", &config.molecule_stale_days.to_string())?;
        store.set_config("compaction_min_age_days", &config.compaction_min_age_days.to_string())?;
    }
    config.save(&beads_dir)?;

    write_pid_file(&beads_dir.join("daemon.pid"))?;

    let registry = Registry::at(state_dir);
    let workspace_path = workspace_root.display().to_string();
    registry.register(RegistryEntry {
        workspace_path: workspace_path.clone(),
        socket_path: socket_path.display().to_string(),
        database_path: database_path.display().to_string(),
        pid: std::process::id(),
        version: SERVER_VERSION.to_string(),
        started_at: chrono::Utc::now(),
    })?;

    let mut server = Server::start(
        &socket_path,
        database_path.display().to_string(),
        text_path,
        config.prefix.clone(),
        SERVER_VERSION.to_string(),
        ServerConfig {
            max_conns: env::max_conns(),
            request_timeout: env::request_timeout(),
            mutation_buffer: env::mutation_buffer(),
        },
    )?;

    println!("READY");
    let _ = std::io::stdout().flush();
    tracing::info!("listening on {}", socket_path.display());

    server.join();

    tracing::info!("shutting down, dropped {} mutation events over lifetime", server.dropped_mutations());
    let _ = registry.deregister(&workspace_path);
    let _ = fs::remove_file(&socket_path);
    let _ = fs::remove_file(beads_dir.join("daemon.pid"));
    Ok(())
}

fn parse_workspace(args: &[String]) -> PathBuf {
    for i in 0..args.len() {
        if args[i] == "--workspace" {
            if let Some(dir) = args.get(i + 1) {
                return PathBuf::from(dir);
            }
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn parse_state_dir(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == "--state-dir" {
            return args.get(i + 1).map(PathBuf::from);
        }
    }
    None
}

fn default_state_dir() -> PathBuf {
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join("beads");
    }
    dirs::home_dir().map(|h| h.join(".beads")).unwrap_or_else(|| PathBuf::from(".beads"))
}

fn setup_logging(log_path: &Path) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(log_path) {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(file).with_ansi(false).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
}

fn write_pid_file(pid_path: &Path) -> wk_core::Result<()> {
    fs::write(pid_path, std::process::id().to_string())?;
    Ok(())
}
