use super::*;

/// RAII guard that sets an env var and restores it on drop, so these tests
/// don't leak `BEADS_STATE_DIR` into whatever else runs in this process.
struct EnvGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &'static str, value: &std::path::Path) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self { key, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(val) => std::env::set_var(self.key, val),
            None => std::env::remove_var(self.key),
        }
    }
}

#[test]
fn find_for_workspace_matches_canonicalised_path() {
    let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let state = tmp.path().join("state");
    std::fs::create_dir_all(&state).unwrap_or_else(|e| panic!("mkdir: {e}"));
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap_or_else(|e| panic!("mkdir: {e}"));

    let canonical = workspace.canonicalize().unwrap_or_else(|e| panic!("canonicalize: {e}"));
    let body = format!(
        r#"[{{"workspace_path":"{}","socket_path":"/tmp/x/bd.sock","pid":999999,"version":"0.4.0","started_at":"2024-01-01T00:00:00Z"}}]"#,
        canonical.display()
    );
    std::fs::write(state.join("registry.json"), body).unwrap_or_else(|e| panic!("write: {e}"));

    let _guard = EnvGuard::set("BEADS_STATE_DIR", &state);
    let entry = find_for_workspace(&workspace).unwrap_or_else(|| panic!("expected a registry match"));
    assert_eq!(entry.socket_path, "/tmp/x/bd.sock");
}

#[test]
fn find_for_workspace_returns_none_for_missing_registry() {
    let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let _guard = EnvGuard::set("BEADS_STATE_DIR", tmp.path());
    assert!(find_for_workspace(tmp.path()).is_none());
}

#[test]
fn find_for_workspace_returns_none_for_unrelated_entries() {
    let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let state = tmp.path().join("state");
    std::fs::create_dir_all(&state).unwrap_or_else(|e| panic!("mkdir: {e}"));
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap_or_else(|e| panic!("mkdir: {e}"));

    std::fs::write(
        state.join("registry.json"),
        r#"[{"workspace_path":"/somewhere/else","socket_path":"/tmp/y/bd.sock","pid":999999,"version":"0.4.0","started_at":"2024-01-01T00:00:00Z"}]"#,
    )
    .unwrap_or_else(|e| panic!("write: {e}"));

    let _guard = EnvGuard::set("BEADS_STATE_DIR", &state);
    assert!(find_for_workspace(&workspace).is_none());
}
