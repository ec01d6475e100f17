use super::*;

#[test]
fn default_config_has_bd_prefix() {
    let config = WorkspaceConfig::default();
    assert_eq!(config.prefix, "bd");
    assert_eq!(config.tombstone_ttl_days, 90);
    assert_eq!(config.tombstone_clock_skew_grace_hours, 24);
}

#[test]
fn load_missing_file_returns_default() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let config = WorkspaceConfig::load(dir.path()).unwrap_or_else(|e| panic!("load: {e}"));
    assert_eq!(config, WorkspaceConfig::default());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let mut config = WorkspaceConfig::default();
    config.prefix = "proj".to_string();
    config.tombstone_ttl_days = 30;
    config.save(dir.path()).unwrap_or_else(|e| panic!("save: {e}"));

    let loaded = WorkspaceConfig::load(dir.path()).unwrap_or_else(|e| panic!("load: {e}"));
    assert_eq!(loaded.prefix, "proj");
    assert_eq!(loaded.tombstone_ttl_days, 30);
}

#[test]
fn env_override_takes_precedence_over_file() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let mut config = WorkspaceConfig::default();
    config.prefix = "file-prefix".to_string();
    config.save(dir.path()).unwrap_or_else(|e| panic!("save: {e}"));

    std::env::set_var("BD_PREFIX", "env-prefix");
    let loaded = WorkspaceConfig::load(dir.path()).unwrap_or_else(|e| panic!("load: {e}"));
    std::env::remove_var("BD_PREFIX");

    assert_eq!(loaded.prefix, "env-prefix");
}

#[test]
fn tombstone_ttl_and_grace_convert_to_chrono_duration() {
    let config = WorkspaceConfig::default();
    assert_eq!(config.tombstone_ttl(), Duration::days(90));
    assert_eq!(config.clock_skew_grace(), Duration::hours(24));
}
