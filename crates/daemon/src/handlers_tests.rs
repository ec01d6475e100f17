use super::*;
use wk_core::Store;

fn ctx<'a>(store: &'a mut Store, mutations: &'a MutationBus, text_path: &'a Path) -> HandlerContext<'a> {
    HandlerContext {
        store,
        prefix: "bd",
        text_path,
        mutations,
        server_version: "0.4.0",
        started_at: Utc::now(),
    }
}

#[test]
fn create_then_show_round_trips() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    let created = create(json!({"title": "fix the thing"}), "alice", &mut c)
        .unwrap_or_else(|e| panic!("create: {e}"));
    let id = created["issue"]["id"].as_str().unwrap_or_default().to_string();
    assert!(id.starts_with("bd-"));

    let shown = show(json!({"id": id}), &mut c).unwrap_or_else(|e| panic!("show: {e}"));
    assert_eq!(shown["issue"]["title"], "fix the thing");
}

#[test]
fn create_emits_a_mutation_event() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let before = crate::mutation::now_ms();
    let mut c = ctx(&mut store, &bus, &path);

    create(json!({"title": "emit me"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));

    let events = bus.since(before);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "emit me");
}

#[test]
fn update_claim_then_already_claimed_by_other() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    let created = create(json!({"title": "claim me"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));
    let id = created["issue"]["id"].as_str().unwrap_or_default().to_string();

    let claimed = update(json!({"id": id, "claim": true}), "bob", &mut c).unwrap_or_else(|e| panic!("update: {e}"));
    assert_eq!(claimed["issue"]["assignee"], "bob");
    assert_eq!(claimed["issue"]["status"], "in_progress");

    match update(json!({"id": id, "claim": true}), "carol", &mut c) {
        Err(Error::AlreadyClaimed(_)) => {}
        other => panic!("expected AlreadyClaimed, got {other:?}"),
    }
}

#[test]
fn close_without_force_reports_open_blocker() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    let a = create(json!({"title": "a"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));
    let b = create(json!({"title": "b"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));
    let a_id = a["issue"]["id"].as_str().unwrap_or_default().to_string();
    let b_id = b["issue"]["id"].as_str().unwrap_or_default().to_string();

    dep_add(json!({"issue_id": a_id, "depends_on_id": b_id, "type": "blocks"}), "alice", &mut c)
        .unwrap_or_else(|e| panic!("dep_add: {e}"));

    match close(json!({"id": a_id}), "alice", &mut c) {
        Err(Error::BlockedClose { .. }) => {}
        other => panic!("expected BlockedClose, got {other:?}"),
    }
}

#[test]
fn delete_tombstones_and_list_excludes_it() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    let created = create(json!({"title": "gone"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));
    let id = created["issue"]["id"].as_str().unwrap_or_default().to_string();

    delete(json!({"id": id}), "alice", &mut c).unwrap_or_else(|e| panic!("delete: {e}"));
    let listed = list(Value::Null, &mut c).unwrap_or_else(|e| panic!("list: {e}"));
    assert_eq!(listed["count"], 0);
}

#[test]
fn comment_add_and_list_round_trip() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    let created = create(json!({"title": "discuss"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));
    let id = created["issue"]["id"].as_str().unwrap_or_default().to_string();

    comment_add(json!({"issue_id": id, "text": "looks good"}), "bob", &mut c)
        .unwrap_or_else(|e| panic!("comment_add: {e}"));
    let listed = comment_list(json!({"issue_id": id}), &mut c).unwrap_or_else(|e| panic!("comment_list: {e}"));
    let comments = listed["comments"].as_array().unwrap_or_else(|| panic!("comments not array"));
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["author"], "bob");
}

#[test]
fn batch_stops_at_first_failure() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    let result = batch(
        json!({"operations": [
            {"operation": "create", "args": {"title": "first"}},
            {"operation": "show", "args": {"id": "bd-doesnotexist"}},
            {"operation": "create", "args": {"title": "never runs"}},
        ]}),
        "alice",
        &mut c,
    )
    .unwrap_or_else(|e| panic!("batch: {e}"));

    let results = result["results"].as_array().unwrap_or_else(|| panic!("results not array"));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);
}

#[test]
fn epic_status_counts_closed_children() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    let epic = create(json!({"title": "epic", "issue_type": "epic"}), "alice", &mut c)
        .unwrap_or_else(|e| panic!("create: {e}"));
    let epic_id = epic["issue"]["id"].as_str().unwrap_or_default().to_string();

    let child = create(json!({"title": "step one"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));
    let child_id = child["issue"]["id"].as_str().unwrap_or_default().to_string();
    dep_add(
        json!({"issue_id": child_id, "depends_on_id": epic_id, "type": "parent-child"}),
        "alice",
        &mut c,
    )
    .unwrap_or_else(|e| panic!("dep_add: {e}"));
    close(json!({"id": child_id}), "alice", &mut c).unwrap_or_else(|e| panic!("close: {e}"));

    let status = epic_status(json!({"id": epic_id}), &mut c).unwrap_or_else(|e| panic!("epic_status: {e}"));
    assert_eq!(status["total_steps"], 1);
    assert_eq!(status["closed_steps"], 1);
    assert_eq!(status["fraction_complete"], 1.0);
}

#[test]
fn export_then_import_round_trips_into_a_fresh_store() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let text_path = dir.path().join("issues.jsonl");

    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    {
        let mut c = ctx(&mut store, &bus, &text_path);
        create(json!({"title": "exported"}), "alice", &mut c).unwrap_or_else(|e| panic!("create: {e}"));
        do_export(Value::Null, &mut c).unwrap_or_else(|e| panic!("export: {e}"));
    }

    let mut fresh = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let mut c2 = ctx(&mut fresh, &bus, &text_path);
    let report = do_import(Value::Null, "importer", &mut c2).unwrap_or_else(|e| panic!("import: {e}"));
    let created = report["created"].as_array().unwrap_or_else(|| panic!("created not array"));
    assert_eq!(created.len(), 1);
}

#[test]
fn dispatch_rejects_unknown_operation() {
    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let bus = MutationBus::new(8);
    let path = PathBuf::from("/tmp/unused.jsonl");
    let mut c = ctx(&mut store, &bus, &path);

    match dispatch("not_a_real_operation", Value::Null, "alice", &mut c) {
        Err(Error::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}
