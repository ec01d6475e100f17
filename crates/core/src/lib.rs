// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! beads-core: the durable store, text-file codec, three-way merge, and
//! import engine shared by the `beadsd` daemon and the `bd` CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod hash;
pub mod id;
pub mod identity;
pub mod import;
pub mod issue;
pub mod jsonl;
pub mod merge;

pub use config::WorkspaceConfig;
pub use db::{EmptyField, SearchFilter, Store};
pub use error::{Error, Result};
pub use hash::content_hash;
pub use identity::get_user_name;
pub use issue::{
    Comment, Dependency, DependencyType, Issue, IssueType, IssueUpdate, Label, MutationEvent,
    MutationKind, Status,
};
