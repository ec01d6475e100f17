// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation dispatch: maps each RPC `operation` (§4.4) onto the store and
//! import/export engines. Handlers never touch the wire format directly —
//! they return `Result<Value>`, and the caller in `server.rs` is the single
//! place a `Result` becomes a `Response` (§7).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use wk_core::{
    db::EmptyField, db::SearchFilter, export, id, import, Comment, Dependency, DependencyType,
    Error, Issue, IssueType, IssueUpdate, MutationEvent, MutationKind, Result, Status, Store,
};
use wk_ipc::operation;

use crate::mutation::MutationBus;

/// Everything a handler needs beyond the request's own `args`: the store
/// (already locked by the caller), the workspace's configuration, the
/// mutation bus, and the text file path export/import read and write.
pub struct HandlerContext<'a> {
    pub store: &'a mut Store,
    pub prefix: &'a str,
    pub text_path: &'a Path,
    pub mutations: &'a MutationBus,
    pub server_version: &'a str,
    pub started_at: DateTime<Utc>,
}

pub fn dispatch(op: &str, args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    match op {
        operation::PING => Ok(json!({"pong": true})),
        operation::STATUS => status(ctx),
        operation::HEALTH => Ok(json!({"healthy": true})),
        operation::METRICS => Ok(json!({"dropped_mutations": ctx.mutations.dropped_count()})),
        operation::CREATE => create(args, actor, ctx),
        operation::UPDATE => update(args, actor, ctx),
        operation::CLOSE => close(args, actor, ctx),
        operation::DELETE => delete(args, actor, ctx),
        operation::LIST => list(args, ctx),
        operation::COUNT => count(args, ctx),
        operation::SHOW => show(args, ctx),
        operation::RESOLVE_ID => resolve_id(args, ctx),
        operation::READY => ready(ctx),
        operation::BLOCKED => blocked(ctx),
        operation::STALE => stale(args, ctx),
        operation::STATS => stats(ctx),
        operation::DEP_ADD => dep_add(args, actor, ctx),
        operation::DEP_REMOVE => dep_remove(args, actor, ctx),
        operation::DEP_TREE => dep_tree(args, ctx),
        operation::LABEL_ADD => label_add(args, actor, ctx),
        operation::LABEL_REMOVE => label_remove(args, actor, ctx),
        operation::COMMENT_LIST => comment_list(args, ctx),
        operation::COMMENT_ADD => comment_add(args, actor, ctx),
        operation::COMPACT => compact(args, ctx),
        operation::COMPACT_STATS => compact_stats(ctx),
        operation::EXPORT => do_export(args, ctx),
        operation::IMPORT => do_import(args, actor, ctx),
        operation::EPIC_STATUS => epic_status(args, ctx),
        operation::GET_MUTATIONS => get_mutations(args, ctx),
        operation::GET_MOLECULE_PROGRESS => epic_status(args, ctx),
        operation::GET_WORKER_STATUS => worker_status(ctx),
        operation::GET_CONFIG => get_config(args, ctx),
        operation::MOL_STALE => mol_stale(ctx),
        operation::GATE_CREATE => create(args, actor, ctx),
        operation::GATE_LIST => gate_list(ctx),
        operation::GATE_SHOW => show(args, ctx),
        operation::GATE_CLOSE => close(args, actor, ctx),
        // The real polling loop lives in `server.rs::poll_gate`, which needs
        // to release the store lock between polls; it never reaches this
        // match arm for a top-level request. Reached only via `batch`,
        // where the store is already held for the whole batch and polling
        // would either deadlock or starve every other connection.
        operation::GATE_WAIT => Err(Error::InvalidInput(
            "gate_wait cannot run inside batch; issue it as a top-level request".to_string(),
        )),
        operation::SHUTDOWN => Ok(json!({"shutting_down": true})),
        operation::BATCH => batch(args, actor, ctx),
        other => Err(Error::InvalidInput(format!("unknown operation: {other}"))),
    }
}

fn status(ctx: &HandlerContext) -> Result<Value> {
    let uptime = Utc::now().signed_duration_since(ctx.started_at).num_seconds().max(0);
    Ok(json!({
        "pid": std::process::id(),
        "uptime_secs": uptime,
        "version": ctx.server_version,
        "database": ctx.text_path,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    design: Option<String>,
    #[serde(default)]
    acceptance_criteria: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    status: Option<Status>,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_issue_type")]
    issue_type: IssueType,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    external_ref: Option<String>,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    template: bool,
    #[serde(default)]
    mol_type: Option<String>,
    #[serde(default)]
    due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    defer_until: Option<DateTime<Utc>>,
}

fn default_issue_type() -> IssueType {
    IssueType::Task
}

fn create(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    let parsed: CreateArgs = parse_args(args)?;
    let now = Utc::now();
    let id = match parsed.id {
        Some(id) => id,
        None => {
            let store = &ctx.store;
            id::generate_unique_id(ctx.prefix, &parsed.title, &now, |candidate| {
                store.issue_exists(candidate).unwrap_or(false)
            })
        }
    };
    let issue = Issue {
        id,
        title: parsed.title,
        description: parsed.description,
        design: parsed.design,
        acceptance_criteria: parsed.acceptance_criteria,
        notes: parsed.notes,
        status: parsed.status.unwrap_or(Status::Open),
        priority: parsed.priority,
        issue_type: parsed.issue_type,
        assignee: parsed.assignee,
        external_ref: parsed.external_ref,
        pinned: parsed.pinned,
        template: parsed.template,
        mol_type: parsed.mol_type,
        due_at: parsed.due_at,
        defer_until: parsed.defer_until,
        closed_at: None,
        close_reason: None,
        closed_by_session: None,
        deleted_at: None,
        deleted_by: None,
        delete_reason: None,
        original_type: None,
        created_at: now,
        created_by: actor.to_string(),
        updated_at: now,
        content_hash: None,
    };
    let created = ctx.store.create(issue, actor)?;
    emit(ctx, MutationKind::Create, &created.id, &created.title, actor, created.assignee.clone(), None, None);
    Ok(issue_json(ctx, &created.id)?)
}

fn update(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        id: String,
        #[serde(flatten)]
        update: IssueUpdate,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.id)?;
    let before = ctx.store.get(&id)?;
    let updated = ctx.store.update(&id, &parsed.update, actor)?;
    let kind = if before.status != updated.status {
        MutationKind::Status
    } else {
        MutationKind::Update
    };
    emit(
        ctx,
        kind,
        &updated.id,
        &updated.title,
        actor,
        updated.assignee.clone(),
        Some(before.status),
        Some(updated.status),
    );
    issue_json(ctx, &updated.id)
}

fn close(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        id: String,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        closed_by_session: Option<String>,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.id)?;
    let before = ctx.store.get(&id)?;
    let closed = ctx.store.close(&id, actor, parsed.force, parsed.reason, parsed.closed_by_session)?;
    emit(
        ctx,
        MutationKind::Status,
        &closed.id,
        &closed.title,
        actor,
        closed.assignee.clone(),
        Some(before.status),
        Some(closed.status),
    );
    issue_json(ctx, &closed.id)
}

fn delete(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        id: String,
        #[serde(default)]
        reason: Option<String>,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.id)?;
    let tombstoned = ctx.store.tombstone(&id, actor, parsed.reason)?;
    emit(
        ctx,
        MutationKind::Delete,
        &tombstoned.id,
        &tombstoned.title,
        actor,
        None,
        Some(Status::Open),
        Some(Status::Tombstone),
    );
    Ok(json!({"id": tombstoned.id, "status": tombstoned.status}))
}

#[derive(Debug, Default, Deserialize)]
struct FilterArgs {
    #[serde(default)]
    status: Vec<Status>,
    #[serde(default)]
    priority_min: Option<i32>,
    #[serde(default)]
    priority_max: Option<i32>,
    #[serde(rename = "type", default)]
    issue_type: Option<IssueType>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    labels_all: Vec<String>,
    #[serde(default)]
    labels_any: Vec<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_after: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_before: Option<DateTime<Utc>>,
    #[serde(default)]
    closed_after: Option<DateTime<Utc>>,
    #[serde(default)]
    closed_before: Option<DateTime<Utc>>,
    #[serde(default)]
    empty_fields: Vec<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    include_templates: bool,
    #[serde(default)]
    include_tombstones: bool,
    #[serde(default)]
    limit: Option<usize>,
}

fn empty_field_of(name: &str) -> Option<EmptyField> {
    match name {
        "description" => Some(EmptyField::Description),
        "design" => Some(EmptyField::Design),
        "acceptance_criteria" => Some(EmptyField::AcceptanceCriteria),
        "notes" => Some(EmptyField::Notes),
        "assignee" => Some(EmptyField::Assignee),
        "external_ref" => Some(EmptyField::ExternalRef),
        _ => None,
    }
}

fn build_filter(parsed: FilterArgs) -> SearchFilter {
    SearchFilter {
        status: parsed.status,
        priority_min: parsed.priority_min,
        priority_max: parsed.priority_max,
        issue_type: parsed.issue_type,
        assignee: parsed.assignee,
        labels_all: parsed.labels_all,
        labels_any: parsed.labels_any,
        text: parsed.text,
        created_after: parsed.created_after,
        created_before: parsed.created_before,
        updated_after: parsed.updated_after,
        updated_before: parsed.updated_before,
        closed_after: parsed.closed_after,
        closed_before: parsed.closed_before,
        empty_fields: parsed.empty_fields.iter().filter_map(|s| empty_field_of(s)).collect(),
        parent_id: parsed.parent_id,
        include_templates: parsed.include_templates,
        include_tombstones: parsed.include_tombstones,
        limit: parsed.limit,
    }
}

fn list(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    let parsed: FilterArgs = parse_args(args)?;
    let filter = build_filter(parsed);
    let issues = ctx.store.search(&filter)?;
    Ok(json!({"issues": issues, "count": issues_len(&issues)}))
}

fn issues_len(issues: &[Issue]) -> usize {
    issues.len()
}

fn count(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    let parsed: FilterArgs = parse_args(args)?;
    let filter = build_filter(parsed);
    let issues = ctx.store.search(&filter)?;
    Ok(json!({"count": issues.len()}))
}

fn show(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        id: String,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.id)?;
    issue_json(ctx, &id)
}

fn resolve_id(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        partial: String,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.partial)?;
    Ok(json!({"id": id}))
}

fn ready(ctx: &mut HandlerContext) -> Result<Value> {
    let ids = ctx.store.ready_ids()?;
    Ok(json!({"ids": ids}))
}

fn blocked(ctx: &mut HandlerContext) -> Result<Value> {
    let ids = ctx.store.blocked_ids()?;
    Ok(json!({"ids": ids}))
}

fn stale(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize, Default)]
    struct Args {
        #[serde(default = "default_stale_days")]
        days: i64,
    }
    fn default_stale_days() -> i64 {
        14
    }
    let parsed: Args = parse_args(args)?;
    let ids = ctx.store.stale_ids(parsed.days)?;
    Ok(json!({"ids": ids}))
}

fn stats(ctx: &mut HandlerContext) -> Result<Value> {
    let all = ctx.store.all_issues()?;
    let mut by_status: HashMap<String, usize> = HashMap::new();
    for issue in &all {
        *by_status.entry(issue.status.as_str().to_string()).or_default() += 1;
    }
    Ok(json!({"total": all.len(), "by_status": by_status}))
}

#[derive(Debug, Deserialize)]
struct DepArgs {
    issue_id: String,
    depends_on_id: String,
    #[serde(rename = "type", default = "default_dep_type")]
    dep_type: DependencyType,
}

fn default_dep_type() -> DependencyType {
    DependencyType::Blocks
}

fn dep_add(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    let parsed: DepArgs = parse_args(args)?;
    let issue_id = ctx.store.resolve_id(&parsed.issue_id)?;
    let depends_on_id = ctx.store.resolve_id(&parsed.depends_on_id)?;
    ctx.store.add_dependency(&issue_id, &depends_on_id, parsed.dep_type)?;
    let issue = ctx.store.get(&issue_id)?;
    emit(ctx, MutationKind::Update, &issue_id, &issue.title, actor, issue.assignee.clone(), None, None);
    Ok(json!({"issue_id": issue_id, "depends_on_id": depends_on_id, "type": parsed.dep_type}))
}

fn dep_remove(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    let parsed: DepArgs = parse_args(args)?;
    let issue_id = ctx.store.resolve_id(&parsed.issue_id)?;
    let depends_on_id = ctx.store.resolve_id(&parsed.depends_on_id)?;
    ctx.store.remove_dependency(&issue_id, &depends_on_id, parsed.dep_type)?;
    let issue = ctx.store.get(&issue_id)?;
    emit(ctx, MutationKind::Update, &issue_id, &issue.title, actor, issue.assignee.clone(), None, None);
    Ok(json!({"removed": true}))
}

fn dep_tree(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        id: String,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.id)?;
    let ids = ctx.store.dependency_tree(&id)?;
    Ok(json!({"ids": ids}))
}

fn label_add(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        issue_id: String,
        name: String,
    }
    let parsed: Args = parse_args(args)?;
    let issue_id = ctx.store.resolve_id(&parsed.issue_id)?;
    ctx.store.add_label(&issue_id, &parsed.name)?;
    let issue = ctx.store.get(&issue_id)?;
    emit(ctx, MutationKind::Update, &issue_id, &issue.title, actor, issue.assignee.clone(), None, None);
    Ok(json!({"issue_id": issue_id, "name": parsed.name}))
}

fn label_remove(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        issue_id: String,
        name: String,
    }
    let parsed: Args = parse_args(args)?;
    let issue_id = ctx.store.resolve_id(&parsed.issue_id)?;
    let removed = ctx.store.remove_label(&issue_id, &parsed.name)?;
    if removed {
        let issue = ctx.store.get(&issue_id)?;
        emit(ctx, MutationKind::Update, &issue_id, &issue.title, actor, issue.assignee.clone(), None, None);
    }
    Ok(json!({"removed": removed}))
}

fn comment_list(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        issue_id: String,
    }
    let parsed: Args = parse_args(args)?;
    let issue_id = ctx.store.resolve_id(&parsed.issue_id)?;
    let comments: Vec<Comment> = ctx.store.list_comments(&issue_id)?;
    Ok(json!({"comments": comments}))
}

fn comment_add(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        issue_id: String,
        #[serde(default)]
        author: Option<String>,
        text: String,
    }
    let parsed: Args = parse_args(args)?;
    let issue_id = ctx.store.resolve_id(&parsed.issue_id)?;
    let author = parsed.author.unwrap_or_else(|| actor.to_string());
    let comment = ctx.store.add_comment(&issue_id, &author, &parsed.text)?;
    let issue = ctx.store.get(&issue_id)?;
    emit(ctx, MutationKind::Comment, &issue_id, &issue.title, actor, issue.assignee.clone(), None, None);
    Ok(json!({"comment": comment}))
}

fn compact(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        id: String,
        tier: String,
        original_size: i64,
        compacted_size: i64,
        commit_hash: String,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.id)?;
    if !ctx.store.check_eligibility(&id, &parsed.tier)? {
        return Err(Error::InvalidInput(format!("{id} is not eligible for compaction at tier {}", parsed.tier)));
    }
    ctx.store.apply_compaction(&id, &parsed.tier, parsed.original_size, parsed.compacted_size, &parsed.commit_hash)?;
    Ok(json!({"id": id, "tier": parsed.tier, "applied": true}))
}

fn compact_stats(ctx: &mut HandlerContext) -> Result<Value> {
    let all = ctx.store.all_issues()?;
    let mut eligible = 0usize;
    for issue in &all {
        if issue.closed_at.is_some() && ctx.store.check_eligibility(&issue.id, "summary").unwrap_or(false) {
            eligible += 1;
        }
    }
    Ok(json!({"eligible_for_summary_tier": eligible}))
}

fn do_export(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize, Default)]
    struct Args {
        #[serde(default)]
        path: Option<PathBuf>,
    }
    let parsed: Args = parse_args(args)?;
    let path = parsed.path.unwrap_or_else(|| ctx.text_path.to_path_buf());
    let manifest = export::export(ctx.store, &path, export::ExportPolicy::AllowPartial)?;
    Ok(serde_json::to_value(manifest)?)
}

fn do_import(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize, Default)]
    struct Args {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        rename_prefix: Option<String>,
        #[serde(default)]
        snapshot_protection: HashMap<String, DateTime<Utc>>,
    }
    let parsed: Args = parse_args(args)?;
    let path = parsed.path.unwrap_or_else(|| ctx.text_path.to_path_buf());
    let records: Vec<export::ExportRecord> = wk_core::jsonl::read_all(&path)?;
    let incoming: Vec<Issue> = records.into_iter().map(|r| r.issue).collect();
    let opts = import::ImportOptions {
        rename_prefix: parsed.rename_prefix,
        snapshot_protection: parsed.snapshot_protection,
    };
    let report = import::import(ctx.store, incoming, &opts, actor)?;
    Ok(json!({
        "created": report.created,
        "updated": report.updated,
        "unchanged": report.unchanged,
        "skipped": report.skipped,
        "purged": report.purged,
        "id_mapping": report.id_mapping,
    }))
}

fn epic_status(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        id: String,
    }
    let parsed: Args = parse_args(args)?;
    let id = ctx.store.resolve_id(&parsed.id)?;
    let filter = SearchFilter {
        parent_id: Some(id.clone()),
        include_templates: true,
        include_tombstones: false,
        ..Default::default()
    };
    let children = ctx.store.search(&filter)?;
    let closed = children.iter().filter(|c| c.status == Status::Closed).count();
    let total = children.len();
    Ok(json!({
        "id": id,
        "total_steps": total,
        "closed_steps": closed,
        "fraction_complete": if total == 0 { 0.0 } else { closed as f64 / total as f64 },
    }))
}

fn get_mutations(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize, Default)]
    struct Args {
        #[serde(default)]
        since_ms: i64,
    }
    let parsed: Args = parse_args(args)?;
    let events: Vec<MutationEvent> = ctx.mutations.since(parsed.since_ms);
    Ok(json!({"events": events, "dropped": ctx.mutations.dropped_count()}))
}

fn worker_status(ctx: &mut HandlerContext) -> Result<Value> {
    let filter = SearchFilter {
        status: vec![Status::Open, Status::InProgress, Status::Blocked],
        ..Default::default()
    };
    let issues = ctx.store.search(&filter)?;
    let mut by_assignee: HashMap<String, (usize, usize)> = HashMap::new();
    for issue in &issues {
        let Some(assignee) = &issue.assignee else { continue };
        let entry = by_assignee.entry(assignee.clone()).or_default();
        if issue.status == Status::InProgress {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }
    let workers: Vec<Value> = by_assignee
        .into_iter()
        .map(|(assignee, (open, in_progress))| json!({"assignee": assignee, "open": open, "in_progress": in_progress}))
        .collect();
    Ok(json!({"workers": workers}))
}

fn get_config(args: Value, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        key: String,
    }
    let parsed: Args = parse_args(args)?;
    let value = ctx.store.get_config(&parsed.key)?;
    Ok(json!({"key": parsed.key, "value": value}))
}

fn mol_stale(ctx: &mut HandlerContext) -> Result<Value> {
    let filter = SearchFilter {
        status: vec![Status::Open, Status::InProgress],
        ..Default::default()
    };
    let issues = ctx.store.search(&filter)?;
    let stale_days: i64 = ctx
        .store
        .get_config("molecule_stale_days")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(14);
    let cutoff = Utc::now() - chrono::Duration::days(stale_days);
    let stale: Vec<&str> = issues
        .iter()
        .filter(|i| i.mol_type.is_some() && i.updated_at < cutoff)
        .map(|i| i.id.as_str())
        .collect();
    Ok(json!({"ids": stale}))
}

fn gate_list(ctx: &mut HandlerContext) -> Result<Value> {
    let issues = ctx.store.all_issues()?;
    let gates: Vec<&Issue> = issues.iter().filter(|i| i.is_gate()).collect();
    Ok(json!({"issues": gates}))
}

fn batch(args: Value, actor: &str, ctx: &mut HandlerContext) -> Result<Value> {
    #[derive(Deserialize)]
    struct BatchOp {
        operation: String,
        #[serde(default)]
        args: Value,
    }
    #[derive(Deserialize)]
    struct Args {
        operations: Vec<BatchOp>,
    }
    let parsed: Args = parse_args(args)?;
    let mut results = Vec::with_capacity(parsed.operations.len());
    for op in parsed.operations {
        match dispatch(&op.operation, op.args, actor, ctx) {
            Ok(value) => results.push(json!({"success": true, "data": value})),
            Err(e) => {
                results.push(json!({"success": false, "error": e.to_string()}));
                break;
            }
        }
    }
    Ok(json!({"results": results}))
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| Error::InvalidInput(format!("invalid args: {e}")))
}

fn issue_json(ctx: &mut HandlerContext, id: &str) -> Result<Value> {
    let issue = ctx.store.get(id)?;
    let dependencies: Vec<Dependency> = ctx.store.dependencies_for_issues(&[id.to_string()])?;
    let labels = ctx.store.labels_for(id)?;
    let comments = ctx.store.list_comments(id)?;
    Ok(json!({
        "issue": issue,
        "dependencies": dependencies,
        "labels": labels,
        "comments": comments,
    }))
}

#[allow(clippy::too_many_arguments)]
fn emit(
    ctx: &HandlerContext,
    kind: MutationKind,
    issue_id: &str,
    title: &str,
    actor: &str,
    assignee: Option<String>,
    old_status: Option<Status>,
    new_status: Option<Status>,
) {
    ctx.mutations.emit(MutationEvent {
        kind,
        issue_id: issue_id.to_string(),
        title: title.to_string(),
        assignee,
        actor: actor.to_string(),
        timestamp: Utc::now(),
        old_status,
        new_status,
        parent_id: None,
        step_count: None,
    });
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
