use super::*;
use chrono::Utc;
use wk_core::export::ExportRecord;
use wk_core::{Issue, IssueType, Status};

fn sample_issue(id: &str) -> Issue {
    let now = Utc::now();
    Issue {
        id: id.to_string(),
        title: "imported".to_string(),
        description: None,
        design: None,
        acceptance_criteria: None,
        notes: None,
        status: Status::Open,
        priority: 0,
        issue_type: IssueType::Task,
        assignee: None,
        external_ref: None,
        pinned: false,
        template: false,
        mol_type: None,
        due_at: None,
        defer_until: None,
        closed_at: None,
        close_reason: None,
        closed_by_session: None,
        deleted_at: None,
        deleted_by: None,
        delete_reason: None,
        original_type: None,
        created_at: now,
        created_by: "tester".to_string(),
        updated_at: now,
        content_hash: None,
    }
}

#[test]
fn maybe_import_ingests_a_changed_text_file() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let text_path = dir.path().join("issues.jsonl");
    let record = ExportRecord {
        issue: sample_issue("bd-abc123"),
        dependencies: Vec::new(),
        labels: Vec::new(),
        comments: Vec::new(),
    };
    wk_core::jsonl::write_all(&text_path, &[record]).unwrap_or_else(|e| panic!("write: {e}"));

    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let mutations = MutationBus::new(8);
    let gate = AutoImportGate::new();

    gate.maybe_import(&mut store, &text_path, "bd", &mutations);

    let issue = store.get("bd-abc123").unwrap_or_else(|e| panic!("get: {e}"));
    assert_eq!(issue.title, "imported");
}

#[test]
fn maybe_import_is_a_no_op_when_nothing_changed() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let text_path = dir.path().join("issues.jsonl");
    wk_core::jsonl::write_all(&text_path, &Vec::<ExportRecord>::new())
        .unwrap_or_else(|e| panic!("write: {e}"));

    let mut store = Store::open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
    let mutations = MutationBus::new(8);
    let gate = AutoImportGate::new();

    gate.maybe_import(&mut store, &text_path, "bd", &mutations);
    gate.maybe_import(&mut store, &text_path, "bd", &mutations);

    assert!(store.all_issues().unwrap_or_else(|e| panic!("all_issues: {e}")).is_empty());
}
