// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `bd` — the thin command-line surface over the Beads core. Every
//! subcommand that touches the store goes through the daemon's RPC (§4.4);
//! `bd merge` is the one exception, calling the merge engine directly
//! against three text-file snapshots the way a version-control merge
//! driver would (§2).
//!
//! This is deliberately not a feature-complete product CLI (§1's
//! non-goals) — just enough surface to create, inspect, and mutate issues
//! against a running daemon for manual and scripted use.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use wkrs::client::Client;

#[derive(Parser)]
#[command(name = "bd", version, about = "Beads: a local-first, distributed issue tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new issue.
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long = "type")]
        issue_type: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// List issues matching a filter.
    List {
        #[arg(long)]
        status: Vec<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        label: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one issue with its dependencies, labels, and comments.
    Show { id: String },
    /// Update fields on an issue.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        assignee: Option<String>,
        /// Atomically set assignee to the caller and status to in_progress;
        /// fails if another actor already holds it.
        #[arg(long)]
        claim: bool,
    },
    /// Close an issue.
    Close {
        id: String,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Tombstone (soft-delete) an issue.
    Delete {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Issues with no open blockers.
    Ready,
    /// Issues with at least one open blocker.
    Blocked,
    /// Workspace-wide counters.
    Stats,
    /// Dependency-edge operations.
    Dep {
        #[command(subcommand)]
        command: DepCommand,
    },
    /// Label operations.
    Label {
        #[command(subcommand)]
        command: LabelCommand,
    },
    /// Comment operations.
    Comment {
        #[command(subcommand)]
        command: CommentCommand,
    },
    /// Export the store to its text file.
    Export {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Import a text file into the store.
    Import {
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        rename_prefix: Option<String>,
    },
    /// Three-way merge three text-file snapshots (no daemon involved).
    Merge {
        base: PathBuf,
        left: PathBuf,
        right: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 90)]
        ttl_days: i64,
        #[arg(long, default_value_t = 24)]
        clock_skew_grace_hours: i64,
    },
    /// Ping the daemon (starting it if necessary) and print its status.
    Status,
    /// Ask the daemon to shut down.
    Shutdown,
    /// A parent issue's completion fraction over its `parent-child` steps.
    EpicStatus { id: String },
    /// Per-assignee open/in-progress counts.
    WorkerStatus,
    /// Gate (waitable external-condition issue) operations.
    Gate {
        #[command(subcommand)]
        command: GateCommand,
    },
}

#[derive(Subcommand)]
enum GateCommand {
    Create { title: String },
    List,
    Show { id: String },
    Close { id: String },
    /// Block until the gate closes or the daemon's request timeout elapses.
    Wait { id: String },
}

#[derive(Subcommand)]
enum DepCommand {
    Add {
        id: String,
        depends_on: String,
        #[arg(long = "type", default_value = "blocks")]
        dep_type: String,
    },
    Remove {
        id: String,
        depends_on: String,
        #[arg(long = "type", default_value = "blocks")]
        dep_type: String,
    },
    Tree {
        id: String,
    },
}

#[derive(Subcommand)]
enum LabelCommand {
    Add { id: String, name: String },
    Remove { id: String, name: String },
}

#[derive(Subcommand)]
enum CommentCommand {
    Add { id: String, text: String },
    List { id: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> wk_core::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    if let Command::Merge {
        base,
        left,
        right,
        output,
        ttl_days,
        clock_skew_grace_hours,
    } = &cli.command
    {
        let opts = wk_core::merge::MergeOptions {
            ttl: chrono::Duration::days(*ttl_days),
            clock_skew_grace: chrono::Duration::hours(*clock_skew_grace_hours),
            now: chrono::Utc::now(),
        };
        let outcome = wkrs::merge_driver::run(base, left, right, output, &opts)?;
        println!("merged {} issues, {} conflicts", outcome.merged_count, outcome.conflict_count);
        return Ok(());
    }

    let client = Client::connect(&cwd)?;

    let (operation, args) = match cli.command {
        Command::Create {
            title,
            description,
            priority,
            issue_type,
            assignee,
        } => {
            let mut args = json!({
                "title": title,
                "description": description,
                "assignee": assignee,
            });
            // `priority` and `issue_type` are plain (non-`Option`) fields on
            // the daemon's `CreateArgs`, so an explicit JSON `null` would
            // fail to deserialize; omit the key entirely when unset and let
            // the daemon's own `#[serde(default)]` apply instead.
            if let Some(p) = priority {
                args["priority"] = json!(p);
            }
            if let Some(t) = issue_type {
                args["issue_type"] = json!(t);
            }
            ("create", args)
        }
        Command::List {
            status,
            assignee,
            label,
            limit,
        } => (
            "list",
            json!({
                "status": status,
                "assignee": assignee,
                "labels_all": label,
                "limit": limit,
            }),
        ),
        Command::Show { id } => ("show", json!({"id": id})),
        Command::Update {
            id,
            title,
            status,
            priority,
            assignee,
            claim,
        } => (
            "update",
            json!({
                "id": id,
                "title": title,
                "status": status,
                "priority": priority,
                "assignee": assignee,
                "claim": if claim { Some(true) } else { None },
            }),
        ),
        Command::Close { id, force, reason } => ("close", json!({"id": id, "force": force, "reason": reason})),
        Command::Delete { id, reason } => ("delete", json!({"id": id, "reason": reason})),
        Command::Ready => ("ready", Value::Null),
        Command::Blocked => ("blocked", Value::Null),
        Command::Stats => ("stats", Value::Null),
        Command::Dep { command } => match command {
            DepCommand::Add { id, depends_on, dep_type } => (
                "dep_add",
                json!({"issue_id": id, "depends_on_id": depends_on, "type": dep_type}),
            ),
            DepCommand::Remove { id, depends_on, dep_type } => (
                "dep_remove",
                json!({"issue_id": id, "depends_on_id": depends_on, "type": dep_type}),
            ),
            DepCommand::Tree { id } => ("dep_tree", json!({"id": id})),
        },
        Command::Label { command } => match command {
            LabelCommand::Add { id, name } => ("label_add", json!({"issue_id": id, "name": name})),
            LabelCommand::Remove { id, name } => ("label_remove", json!({"issue_id": id, "name": name})),
        },
        Command::Comment { command } => match command {
            CommentCommand::Add { id, text } => ("comment_add", json!({"issue_id": id, "text": text})),
            CommentCommand::List { id } => ("comment_list", json!({"issue_id": id})),
        },
        Command::Export { path } => ("export", json!({"path": path})),
        Command::Import { path, rename_prefix } => (
            "import",
            json!({"path": path, "rename_prefix": rename_prefix}),
        ),
        Command::Status => ("status", Value::Null),
        Command::Shutdown => ("shutdown", Value::Null),
        Command::EpicStatus { id } => ("epic_status", json!({"id": id})),
        Command::WorkerStatus => ("get_worker_status", Value::Null),
        Command::Gate { command } => match command {
            GateCommand::Create { title } => ("gate_create", json!({"title": title, "mol_type": "gate"})),
            GateCommand::List => ("gate_list", Value::Null),
            GateCommand::Show { id } => ("gate_show", json!({"id": id})),
            GateCommand::Close { id } => ("gate_close", json!({"id": id})),
            GateCommand::Wait { id } => ("gate_wait", json!({"id": id})),
        },
        Command::Merge { .. } => unreachable!("handled above without a daemon connection"),
    };

    let result = client.call(operation, args)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
