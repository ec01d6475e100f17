// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The store abstraction: a transactional SQLite-backed key-space over
//! issues, dependencies, labels, and comments, plus the dirty-set and
//! config tables the daemon and export path rely on.
//!
//! Per §6 this module's on-disk encoding is not part of the wire contract;
//! only the behaviour described in §4.1 is load-bearing.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::hash;
use crate::issue::{
    Comment, Dependency, DependencyType, Issue, IssueType, IssueUpdate, Label, Status,
};

/// SQL schema for the issue store.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    design TEXT,
    acceptance_criteria TEXT,
    notes TEXT,
    status TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    issue_type TEXT NOT NULL,
    assignee TEXT,
    external_ref TEXT,
    pinned INTEGER NOT NULL DEFAULT 0,
    template INTEGER NOT NULL DEFAULT 0,
    mol_type TEXT,
    due_at TEXT,
    defer_until TEXT,
    closed_at TEXT,
    close_reason TEXT,
    closed_by_session TEXT,
    deleted_at TEXT,
    deleted_by TEXT,
    delete_reason TEXT,
    original_type TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    content_hash TEXT
);

CREATE TABLE IF NOT EXISTS dependencies (
    issue_id TEXT NOT NULL,
    depends_on_id TEXT NOT NULL,
    dep_type TEXT NOT NULL,
    PRIMARY KEY (issue_id, depends_on_id, dep_type),
    CHECK (issue_id != depends_on_id)
);

CREATE TABLE IF NOT EXISTS labels (
    issue_id TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (issue_id, name)
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id TEXT NOT NULL,
    author TEXT NOT NULL,
    created_at TEXT NOT NULL,
    text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dirty_issues (
    issue_id TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS compactions (
    issue_id TEXT NOT NULL,
    tier TEXT NOT NULL,
    original_size INTEGER NOT NULL,
    compacted_size INTEGER NOT NULL,
    commit_hash TEXT NOT NULL,
    applied_at TEXT NOT NULL,
    PRIMARY KEY (issue_id, tier)
);

CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
CREATE INDEX IF NOT EXISTS idx_issues_priority ON issues(priority);
CREATE INDEX IF NOT EXISTS idx_issues_type ON issues(issue_type);
CREATE INDEX IF NOT EXISTS idx_issues_assignee ON issues(assignee);
CREATE INDEX IF NOT EXISTS idx_issues_updated ON issues(updated_at);
CREATE INDEX IF NOT EXISTS idx_issues_external_ref ON issues(external_ref);
CREATE INDEX IF NOT EXISTS idx_deps_depends_on ON dependencies(depends_on_id);
CREATE INDEX IF NOT EXISTS idx_deps_type ON dependencies(dep_type);
CREATE INDEX IF NOT EXISTS idx_labels_name ON labels(name);
CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id);
"#;

fn parse_db<T: std::str::FromStr>(value: &str, column: &str) -> rusqlite::Result<T> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

fn parse_timestamp(value: &str, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

fn parse_timestamp_opt(value: Option<String>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(&v, column)).transpose()
}

/// A single free-text field, used by [`SearchFilter::empty_fields`] to match
/// issues where that field is unset or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyField {
    Description,
    Design,
    AcceptanceCriteria,
    Notes,
    Assignee,
    ExternalRef,
}

impl EmptyField {
    fn column(self) -> &'static str {
        match self {
            EmptyField::Description => "description",
            EmptyField::Design => "design",
            EmptyField::AcceptanceCriteria => "acceptance_criteria",
            EmptyField::Notes => "notes",
            EmptyField::Assignee => "assignee",
            EmptyField::ExternalRef => "external_ref",
        }
    }
}

/// Search predicate over the issue table, covering every axis §4.1 lists.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub status: Vec<Status>,
    pub priority_min: Option<i32>,
    pub priority_max: Option<i32>,
    pub issue_type: Option<IssueType>,
    pub assignee: Option<String>,
    /// Issue must carry every label in this set.
    pub labels_all: Vec<String>,
    /// Issue must carry at least one label in this set.
    pub labels_any: Vec<String>,
    /// Case-insensitive substring match over title, description, and notes.
    pub text: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
    pub closed_after: Option<DateTime<Utc>>,
    pub closed_before: Option<DateTime<Utc>>,
    pub empty_fields: Vec<EmptyField>,
    /// Hierarchical parent filter: only direct children of this id.
    pub parent_id: Option<String>,
    pub include_templates: bool,
    pub include_tombstones: bool,
    pub limit: Option<usize>,
}

const ISSUE_COLUMNS: &str = "id, title, description, design, acceptance_criteria, notes,
    status, priority, issue_type, assignee, external_ref, pinned, template, mol_type,
    due_at, defer_until, closed_at, close_reason, closed_by_session, deleted_at,
    deleted_by, delete_reason, original_type, created_at, created_by, updated_at, content_hash";

fn row_to_issue(row: &rusqlite::Row) -> rusqlite::Result<Issue> {
    let status_str: String = row.get(6)?;
    let issue_type_str: String = row.get(8)?;
    let original_type_str: Option<String> = row.get(22)?;
    let due_at: Option<String> = row.get(14)?;
    let defer_until: Option<String> = row.get(15)?;
    let closed_at: Option<String> = row.get(16)?;
    let deleted_at: Option<String> = row.get(19)?;
    let created_at: String = row.get(23)?;
    let updated_at: String = row.get(25)?;

    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        design: row.get(3)?,
        acceptance_criteria: row.get(4)?,
        notes: row.get(5)?,
        status: parse_db(&status_str, "status")?,
        priority: row.get(7)?,
        issue_type: parse_db(&issue_type_str, "issue_type")?,
        assignee: row.get(9)?,
        external_ref: row.get(10)?,
        pinned: row.get::<_, i64>(11)? != 0,
        template: row.get::<_, i64>(12)? != 0,
        mol_type: row.get(13)?,
        due_at: parse_timestamp_opt(due_at, "due_at")?,
        defer_until: parse_timestamp_opt(defer_until, "defer_until")?,
        closed_at: parse_timestamp_opt(closed_at, "closed_at")?,
        close_reason: row.get(17)?,
        closed_by_session: row.get(18)?,
        deleted_at: parse_timestamp_opt(deleted_at, "deleted_at")?,
        deleted_by: row.get(20)?,
        delete_reason: row.get(21)?,
        original_type: original_type_str
            .map(|s| parse_db(&s, "original_type"))
            .transpose()?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        created_by: row.get(24)?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        content_hash: row.get(26)?,
    })
}

/// The durable store: a single SQLite connection owning one workspace's
/// issues, dependencies, labels, and comments. Per §5, a workspace has at
/// most one writer of record — callers (the daemon) are responsible for
/// that single-writer discipline; the store itself just serialises
/// individual operations via SQLite's own locking.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) a store at `path`, running schema setup.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    /// Opens an in-memory store, for tests and scratch use.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    /// Resolves a (possibly abbreviated) id prefix to exactly one full id.
    /// An exact match short-circuits; otherwise a unique prefix match wins.
    pub fn resolve_id(&self, partial: &str) -> Result<String> {
        if self.issue_exists(partial)? {
            return Ok(partial.to_string());
        }
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM issues WHERE id LIKE ?1 ESCAPE '\\' ORDER BY id")?;
        let escaped = partial.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("{escaped}%");
        let matches: Vec<String> = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        match matches.as_slice() {
            [] => Err(Error::IssueNotFound(partial.to_string())),
            [one] => Ok(one.clone()),
            many => Err(Error::AmbiguousId(partial.to_string(), many.to_vec())),
        }
    }

    pub fn issue_exists(&self, id: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM issues WHERE id = ?1", params![id], |r| r.get(0))?;
        Ok(count > 0)
    }

    pub fn get(&self, id: &str) -> Result<Issue> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], row_to_issue)
            .optional()?
            .ok_or_else(|| Error::IssueNotFound(id.to_string()))
    }

    pub fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<Issue>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE external_ref = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![external_ref], row_to_issue)
            .optional()?)
    }

    /// Creates a new issue, stamping `created_by`/`updated_at` from `actor`
    /// and computing its initial content hash.
    pub fn create(&mut self, mut issue: Issue, actor: &str) -> Result<Issue> {
        issue.created_by = actor.to_string();
        hash::refresh(&mut issue);
        insert_issue_conn(&self.conn, &issue)?;
        self.mark_dirty(&[issue.id.clone()])?;
        Ok(issue)
    }

    /// Creates many issues atomically: all succeed or none do.
    pub fn batch_create(&mut self, issues: Vec<Issue>, actor: &str) -> Result<Vec<Issue>> {
        let tx = self.conn.transaction()?;
        let mut created = Vec::with_capacity(issues.len());
        for mut issue in issues {
            issue.created_by = actor.to_string();
            hash::refresh(&mut issue);
            insert_issue_tx(&tx, &issue)?;
            created.push(issue);
        }
        tx.commit()?;
        let ids: Vec<String> = created.iter().map(|i| i.id.clone()).collect();
        self.mark_dirty(&ids)?;
        Ok(created)
    }

    /// Applies a sparse [`IssueUpdate`] to an existing issue and returns the
    /// resulting row. `claim: true` is handled as an atomic assign-and-start
    /// that fails if the issue is already assigned to someone else.
    pub fn update(&mut self, id: &str, update: &IssueUpdate, actor: &str) -> Result<Issue> {
        let tx = self.conn.transaction()?;
        let mut issue = {
            let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
            tx.query_row(&sql, params![id], row_to_issue)
                .optional()?
                .ok_or_else(|| Error::IssueNotFound(id.to_string()))?
        };

        if let Some(true) = update.claim {
            if let Some(existing) = &issue.assignee {
                if existing != actor {
                    return Err(Error::AlreadyClaimed(existing.clone()));
                }
            }
            issue.assignee = Some(actor.to_string());
            issue.status = Status::InProgress;
        }

        if let Some(v) = &update.title {
            issue.title = v.clone();
        }
        if let Some(v) = &update.description {
            issue.description = v.clone();
        }
        if let Some(v) = &update.design {
            issue.design = v.clone();
        }
        if let Some(v) = &update.acceptance_criteria {
            issue.acceptance_criteria = v.clone();
        }
        if let Some(v) = &update.notes {
            issue.notes = v.clone();
        }
        if let Some(v) = update.status {
            issue.status = v;
        }
        if let Some(v) = update.priority {
            issue.priority = v;
        }
        if let Some(v) = update.issue_type {
            issue.issue_type = v;
        }
        if let Some(v) = &update.assignee {
            issue.assignee = v.clone();
        }
        if let Some(v) = &update.external_ref {
            issue.external_ref = v.clone();
        }
        if let Some(v) = update.pinned {
            issue.pinned = v;
        }
        if let Some(v) = update.template {
            issue.template = v;
        }
        if let Some(v) = &update.mol_type {
            issue.mol_type = v.clone();
        }
        if let Some(v) = update.due_at {
            issue.due_at = v;
        }
        if let Some(v) = update.defer_until {
            issue.defer_until = v;
        }

        issue.updated_at = Utc::now();
        if issue.status != Status::Closed {
            issue.closed_at = None;
            issue.close_reason = None;
            issue.closed_by_session = None;
        }
        hash::refresh(&mut issue);
        update_issue_tx(&tx, &issue)?;
        tx.commit()?;
        self.mark_dirty(&[issue.id.clone()])?;
        Ok(issue)
    }

    /// Closes an issue. Unless `force`, fails if any `blocks` predecessor is
    /// still open.
    pub fn close(
        &mut self,
        id: &str,
        _actor: &str,
        force: bool,
        reason: Option<String>,
        closed_by_session: Option<String>,
    ) -> Result<Issue> {
        let blockers = self.open_blockers(id)?;
        if !force && !blockers.is_empty() {
            return Err(Error::BlockedClose {
                id: id.to_string(),
                blockers,
            });
        }
        let tx = self.conn.transaction()?;
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
        let mut issue = tx
            .query_row(&sql, params![id], row_to_issue)
            .optional()?
            .ok_or_else(|| Error::IssueNotFound(id.to_string()))?;
        let now = Utc::now();
        issue.status = Status::Closed;
        issue.closed_at = Some(now);
        issue.close_reason = reason;
        issue.closed_by_session = closed_by_session;
        issue.updated_at = now;
        hash::refresh(&mut issue);
        update_issue_tx(&tx, &issue)?;
        tx.commit()?;
        self.mark_dirty(&[issue.id.clone()])?;
        Ok(issue)
    }

    /// Soft-deletes an issue into a tombstone. Content fields are cleared;
    /// the id and audit metadata persist so merge can match it later.
    pub fn tombstone(
        &mut self,
        id: &str,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Issue> {
        let tx = self.conn.transaction()?;
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
        let mut issue = tx
            .query_row(&sql, params![id], row_to_issue)
            .optional()?
            .ok_or_else(|| Error::IssueNotFound(id.to_string()))?;
        let now = Utc::now();
        issue.original_type = Some(issue.issue_type);
        issue.title = String::new();
        issue.description = None;
        issue.design = None;
        issue.acceptance_criteria = None;
        issue.notes = None;
        issue.status = Status::Tombstone;
        issue.deleted_at = Some(now);
        issue.deleted_by = Some(actor.to_string());
        issue.delete_reason = reason;
        issue.updated_at = now;
        hash::refresh(&mut issue);
        update_issue_tx(&tx, &issue)?;
        tx.commit()?;
        self.mark_dirty(&[issue.id.clone()])?;
        Ok(issue)
    }

    /// All `blocks` predecessors of `id` that are not themselves closed or
    /// tombstoned.
    pub fn open_blockers(&self, id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.depends_on_id FROM dependencies d
             JOIN issues i ON i.id = d.depends_on_id
             WHERE d.issue_id = ?1 AND d.dep_type = 'blocks'
               AND i.status NOT IN ('closed', 'tombstone')",
        )?;
        let ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Every issue id whose `blocks` set contains at least one open entry.
    pub fn blocked_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT d.issue_id FROM dependencies d
             JOIN issues i ON i.id = d.depends_on_id
             WHERE d.dep_type = 'blocks' AND i.status NOT IN ('closed', 'tombstone')",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Open issues with no open blocker: ready to start.
    pub fn ready_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id FROM issues i
             WHERE i.status = 'open'
               AND i.id NOT IN (
                   SELECT d.issue_id FROM dependencies d
                   JOIN issues b ON b.id = d.depends_on_id
                   WHERE d.dep_type = 'blocks' AND b.status NOT IN ('closed', 'tombstone')
               )
             ORDER BY i.priority ASC, i.created_at ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Open/in-progress issues not updated in at least `days` days.
    pub fn stale_ids(&self, days: i64) -> Result<Vec<String>> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut stmt = self.conn.prepare(
            "SELECT id FROM issues
             WHERE status IN ('open', 'in_progress', 'blocked') AND updated_at < ?1
             ORDER BY updated_at ASC",
        )?;
        let ids = stmt
            .query_map(params![cutoff.to_rfc3339()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn add_dependency(
        &mut self,
        issue_id: &str,
        depends_on_id: &str,
        dep_type: DependencyType,
    ) -> Result<()> {
        if issue_id == depends_on_id {
            return Err(Error::SelfDependency);
        }
        if dep_type == DependencyType::Blocks && self.would_cycle(issue_id, depends_on_id)? {
            return Err(Error::CycleDetected);
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO dependencies (issue_id, depends_on_id, dep_type) VALUES (?1, ?2, ?3)",
            params![issue_id, depends_on_id, dep_type.as_str()],
        )?;
        self.touch(issue_id)?;
        Ok(())
    }

    pub fn remove_dependency(
        &mut self,
        issue_id: &str,
        depends_on_id: &str,
        dep_type: DependencyType,
    ) -> Result<()> {
        let affected = self.conn.execute(
            "DELETE FROM dependencies WHERE issue_id = ?1 AND depends_on_id = ?2 AND dep_type = ?3",
            params![issue_id, depends_on_id, dep_type.as_str()],
        )?;
        if affected == 0 {
            return Err(Error::DependencyNotFound {
                from: issue_id.to_string(),
                to: depends_on_id.to_string(),
                rel: dep_type.to_string(),
            });
        }
        self.touch(issue_id)?;
        Ok(())
    }

    fn would_cycle(&self, issue_id: &str, depends_on_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "WITH RECURSIVE chain(id) AS (
                SELECT depends_on_id FROM dependencies WHERE issue_id = ?1 AND dep_type = 'blocks'
                UNION
                SELECT d.depends_on_id FROM dependencies d
                JOIN chain c ON d.issue_id = c.id WHERE d.dep_type = 'blocks'
            )
            SELECT COUNT(*) FROM chain WHERE id = ?2",
            params![depends_on_id, issue_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Dependency tree rooted at `id`: every transitive `blocks` predecessor.
    pub fn dependency_tree(&self, id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE tree(id) AS (
                SELECT depends_on_id FROM dependencies WHERE issue_id = ?1 AND dep_type = 'blocks'
                UNION
                SELECT d.depends_on_id FROM dependencies d
                JOIN tree t ON d.issue_id = t.id WHERE d.dep_type = 'blocks'
            )
            SELECT id FROM tree",
        )?;
        let ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        let mut stmt = self
            .conn
            .prepare("SELECT issue_id, depends_on_id, dep_type FROM dependencies ORDER BY issue_id, depends_on_id")?;
        let deps = stmt
            .query_map([], |row| {
                let dep_type: String = row.get(2)?;
                Ok(Dependency {
                    issue_id: row.get(0)?,
                    depends_on_id: row.get(1)?,
                    dep_type: parse_db(&dep_type, "dep_type")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(deps)
    }

    pub fn dependencies_for_issues(&self, ids: &[String]) -> Result<Vec<Dependency>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT issue_id, depends_on_id, dep_type FROM dependencies WHERE issue_id IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let deps = stmt
            .query_map(refs.as_slice(), |row| {
                let dep_type: String = row.get(2)?;
                Ok(Dependency {
                    issue_id: row.get(0)?,
                    depends_on_id: row.get(1)?,
                    dep_type: parse_db(&dep_type, "dep_type")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(deps)
    }

    pub fn add_label(&mut self, issue_id: &str, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO labels (issue_id, name) VALUES (?1, ?2)",
            params![issue_id, name],
        )?;
        self.touch(issue_id)?;
        Ok(())
    }

    pub fn remove_label(&mut self, issue_id: &str, name: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM labels WHERE issue_id = ?1 AND name = ?2",
            params![issue_id, name],
        )?;
        if affected > 0 {
            self.touch(issue_id)?;
        }
        Ok(affected > 0)
    }

    pub fn labels_for(&self, issue_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM labels WHERE issue_id = ?1 ORDER BY name")?;
        let labels = stmt
            .query_map(params![issue_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(labels)
    }

    pub fn labels_for_issues(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT issue_id, name FROM labels WHERE issue_id IN ({placeholders}) ORDER BY issue_id, name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        let rows = stmt.query_map(refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (issue_id, name) = row?;
            out.entry(issue_id).or_default().push(name);
        }
        Ok(out)
    }

    pub fn all_labels(&self) -> Result<Vec<Label>> {
        let mut stmt = self
            .conn
            .prepare("SELECT issue_id, name FROM labels ORDER BY issue_id, name")?;
        let labels = stmt
            .query_map([], |row| {
                Ok(Label {
                    issue_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(labels)
    }

    pub fn add_comment(&mut self, issue_id: &str, author: &str, text: &str) -> Result<Comment> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO comments (issue_id, author, created_at, text) VALUES (?1, ?2, ?3, ?4)",
            params![issue_id, author, created_at.to_rfc3339(), text],
        )?;
        self.touch(issue_id)?;
        Ok(Comment {
            issue_id: issue_id.to_string(),
            author: author.to_string(),
            created_at,
            text: text.to_string(),
        })
    }

    pub fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT issue_id, author, created_at, text FROM comments
             WHERE issue_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let comments = stmt
            .query_map(params![issue_id], |row| {
                let created_at: String = row.get(2)?;
                Ok(Comment {
                    issue_id: row.get(0)?,
                    author: row.get(1)?,
                    created_at: parse_timestamp(&created_at, "created_at")?,
                    text: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comments)
    }

    pub fn comments_for_issues(&self, ids: &[String]) -> Result<HashMap<String, Vec<Comment>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT issue_id, author, created_at, text FROM comments
             WHERE issue_id IN ({placeholders}) ORDER BY issue_id, created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut out: HashMap<String, Vec<Comment>> = HashMap::new();
        let rows = stmt.query_map(refs.as_slice(), |row| {
            let created_at: String = row.get(2)?;
            Ok((
                row.get::<_, String>(0)?,
                Comment {
                    issue_id: row.get(0)?,
                    author: row.get(1)?,
                    created_at: parse_timestamp(&created_at, "created_at")?,
                    text: row.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (issue_id, comment) = row?;
            out.entry(issue_id).or_default().push(comment);
        }
        Ok(out)
    }

    /// All issues matching `filter`, sorted by id for a deterministic export
    /// order; `filter.limit` is applied after sorting.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Issue>> {
        let mut sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE 1 = 1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !filter.include_tombstones {
            sql.push_str(" AND status != 'tombstone'");
        }
        if !filter.include_templates {
            sql.push_str(" AND template = 0");
        }
        if !filter.status.is_empty() {
            let placeholders = filter.status.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            sql.push_str(&format!(" AND status IN ({placeholders})"));
            for s in &filter.status {
                args.push(Box::new(s.as_str().to_string()));
            }
        }
        if let Some(min) = filter.priority_min {
            sql.push_str(" AND priority >= ?");
            args.push(Box::new(min));
        }
        if let Some(max) = filter.priority_max {
            sql.push_str(" AND priority <= ?");
            args.push(Box::new(max));
        }
        if let Some(t) = filter.issue_type {
            sql.push_str(" AND issue_type = ?");
            args.push(Box::new(t.as_str().to_string()));
        }
        if let Some(a) = &filter.assignee {
            sql.push_str(" AND assignee = ?");
            args.push(Box::new(a.clone()));
        }
        if let Some(text) = &filter.text {
            sql.push_str(
                " AND (lower(title) LIKE ? ESCAPE '\\' OR lower(description) LIKE ? ESCAPE '\\' OR lower(notes) LIKE ? ESCAPE '\\')",
            );
            let needle = format!(
                "%{}%",
                text.to_lowercase().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
            );
            args.push(Box::new(needle.clone()));
            args.push(Box::new(needle.clone()));
            args.push(Box::new(needle));
        }
        if let Some(t) = filter.created_after {
            sql.push_str(" AND created_at > ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        if let Some(t) = filter.created_before {
            sql.push_str(" AND created_at < ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        if let Some(t) = filter.updated_after {
            sql.push_str(" AND updated_at > ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        if let Some(t) = filter.updated_before {
            sql.push_str(" AND updated_at < ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        if let Some(t) = filter.closed_after {
            sql.push_str(" AND closed_at > ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        if let Some(t) = filter.closed_before {
            sql.push_str(" AND closed_at < ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        for field in &filter.empty_fields {
            sql.push_str(&format!(
                " AND ({col} IS NULL OR {col} = '')",
                col = field.column()
            ));
        }
        if let Some(parent) = &filter.parent_id {
            sql.push_str(" AND id IN (SELECT issue_id FROM dependencies WHERE depends_on_id = ? AND dep_type = 'parent-child')");
            args.push(Box::new(parent.clone()));
        }
        for label in &filter.labels_all {
            sql.push_str(" AND id IN (SELECT issue_id FROM labels WHERE name = ?)");
            args.push(Box::new(label.clone()));
        }
        if !filter.labels_any.is_empty() {
            let placeholders = filter.labels_any.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            sql.push_str(&format!(
                " AND id IN (SELECT issue_id FROM labels WHERE name IN ({placeholders}))"
            ));
            for label in &filter.labels_any {
                args.push(Box::new(label.clone()));
            }
        }

        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let issues = stmt
            .query_map(refs.as_slice(), row_to_issue)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(issues)
    }

    /// Every issue, including tombstones, sorted by id: the export source of
    /// truth (§4.8).
    pub fn all_issues(&self) -> Result<Vec<Issue>> {
        self.search(&SearchFilter {
            include_tombstones: true,
            include_templates: true,
            ..Default::default()
        })
    }

    fn touch(&mut self, issue_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE issues SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), issue_id],
        )?;
        self.mark_dirty(&[issue_id.to_string()])
    }

    pub fn mark_dirty(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO dirty_issues (issue_id) VALUES (?1)",
                params![id],
            )?;
        }
        Ok(())
    }

    pub fn clear_dirty(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.conn
                .execute("DELETE FROM dirty_issues WHERE issue_id = ?1", params![id])?;
        }
        Ok(())
    }

    pub fn dirty_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT issue_id FROM dirty_issues ORDER BY issue_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?1", params![key], |r| r.get(0))
            .optional()?)
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// True if `id` is eligible for compaction at `tier`: closed long enough
    /// ago (default threshold 30 days, overridable via the
    /// `compaction_min_age_days` config key) and not already compacted at
    /// this tier.
    pub fn check_eligibility(&self, id: &str, tier: &str) -> Result<bool> {
        let issue = self.get(id)?;
        let Some(closed_at) = issue.closed_at else {
            return Ok(false);
        };
        let already: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM compactions WHERE issue_id = ?1 AND tier = ?2",
            params![id, tier],
            |r| r.get(0),
        )?;
        if already > 0 {
            return Ok(false);
        }
        let min_age_days: i64 = self
            .get_config("compaction_min_age_days")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        Ok(Utc::now() - closed_at >= chrono::Duration::days(min_age_days))
    }

    pub fn apply_compaction(
        &self,
        id: &str,
        tier: &str,
        original_size: i64,
        compacted_size: i64,
        commit_hash: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO compactions (issue_id, tier, original_size, compacted_size, commit_hash, applied_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(issue_id, tier) DO UPDATE SET
                original_size = excluded.original_size,
                compacted_size = excluded.compacted_size,
                commit_hash = excluded.commit_hash,
                applied_at = excluded.applied_at",
            params![id, tier, original_size, compacted_size, commit_hash, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

fn insert_issue_conn(conn: &Connection, issue: &Issue) -> Result<()> {
    conn.execute(
        "INSERT INTO issues (
            id, title, description, design, acceptance_criteria, notes, status, priority,
            issue_type, assignee, external_ref, pinned, template, mol_type, due_at,
            defer_until, closed_at, close_reason, closed_by_session, deleted_at, deleted_by,
            delete_reason, original_type, created_at, created_by, updated_at, content_hash
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
        )",
        rusqlite::params_from_iter(insert_params(issue)),
    )?;
    Ok(())
}

fn insert_issue_tx(tx: &rusqlite::Transaction, issue: &Issue) -> Result<()> {
    tx.execute(
        "INSERT INTO issues (
            id, title, description, design, acceptance_criteria, notes, status, priority,
            issue_type, assignee, external_ref, pinned, template, mol_type, due_at,
            defer_until, closed_at, close_reason, closed_by_session, deleted_at, deleted_by,
            delete_reason, original_type, created_at, created_by, updated_at, content_hash
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
        )",
        rusqlite::params_from_iter(insert_params(issue)),
    )?;
    Ok(())
}

fn update_issue_tx(tx: &rusqlite::Transaction, issue: &Issue) -> Result<()> {
    tx.execute(
        "UPDATE issues SET
            title = ?2, description = ?3, design = ?4, acceptance_criteria = ?5, notes = ?6,
            status = ?7, priority = ?8, issue_type = ?9, assignee = ?10, external_ref = ?11,
            pinned = ?12, template = ?13, mol_type = ?14, due_at = ?15, defer_until = ?16,
            closed_at = ?17, close_reason = ?18, closed_by_session = ?19, deleted_at = ?20,
            deleted_by = ?21, delete_reason = ?22, original_type = ?23, updated_at = ?26,
            content_hash = ?27
         WHERE id = ?1",
        rusqlite::params_from_iter(insert_params(issue)),
    )?;
    Ok(())
}

/// Positional `?N` bind values for an issue row, in column order, boxed so
/// the optional fields can share one homogeneous iterator.
fn insert_params(issue: &Issue) -> Vec<Box<dyn rusqlite::ToSql>> {
    vec![
        Box::new(issue.id.clone()),
        Box::new(issue.title.clone()),
        Box::new(issue.description.clone()),
        Box::new(issue.design.clone()),
        Box::new(issue.acceptance_criteria.clone()),
        Box::new(issue.notes.clone()),
        Box::new(issue.status.as_str().to_string()),
        Box::new(issue.priority),
        Box::new(issue.issue_type.as_str().to_string()),
        Box::new(issue.assignee.clone()),
        Box::new(issue.external_ref.clone()),
        Box::new(issue.pinned as i64),
        Box::new(issue.template as i64),
        Box::new(issue.mol_type.clone()),
        Box::new(issue.due_at.map(|d| d.to_rfc3339())),
        Box::new(issue.defer_until.map(|d| d.to_rfc3339())),
        Box::new(issue.closed_at.map(|d| d.to_rfc3339())),
        Box::new(issue.close_reason.clone()),
        Box::new(issue.closed_by_session.clone()),
        Box::new(issue.deleted_at.map(|d| d.to_rfc3339())),
        Box::new(issue.deleted_by.clone()),
        Box::new(issue.delete_reason.clone()),
        Box::new(issue.original_type.map(|t| t.as_str().to_string())),
        Box::new(issue.created_at.to_rfc3339()),
        Box::new(issue.created_by.clone()),
        Box::new(issue.updated_at.to_rfc3339()),
        Box::new(issue.content_hash.clone()),
    ]
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
