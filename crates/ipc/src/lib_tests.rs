// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::io::Cursor;
use yare::parameterized;

#[test]
fn request_round_trips_through_json_line() {
    let req = Request::new(operation::CREATE, serde_json::json!({"title": "Fix bug"}))
        .with_actor("alice")
        .with_expected_db("/tmp/issues.db");

    let mut buf = Vec::new();
    write_request(&mut buf, &req).unwrap();
    assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 1);

    let mut reader = Cursor::new(buf);
    let parsed = read_request(&mut reader).unwrap().unwrap();
    assert_eq!(parsed.operation, operation::CREATE);
    assert_eq!(parsed.actor.as_deref(), Some("alice"));
    assert_eq!(parsed.expected_db.as_deref(), Some("/tmp/issues.db"));
}

#[test]
fn read_request_returns_none_at_eof() {
    let mut reader = Cursor::new(Vec::new());
    assert!(read_request(&mut reader).unwrap().is_none());
}

#[test]
fn request_without_args_defaults_to_null() {
    let parsed: Request = serde_json::from_str(r#"{"operation":"ping"}"#).unwrap();
    assert_eq!(parsed.args, serde_json::Value::Null);
}

#[test]
fn response_serializes_without_null_fields() {
    let response = Response::ok(serde_json::json!({"id": "bd-1"}));
    let json = serde_json::to_string(&response).unwrap();
    assert!(!json.contains("\"error\""));

    let err = Response::err("already claimed by alice");
    let json = serde_json::to_string(&err).unwrap();
    assert!(!json.contains("\"data\""));
}

#[test]
fn unknown_operation_is_rejected_by_is_known() {
    assert!(operation::is_known(operation::PING));
    assert!(!operation::is_known("not_a_real_operation"));
}

#[parameterized(
    ping = { operation::PING, false, true },
    health = { operation::HEALTH, true, true },
    metrics = { operation::METRICS, true, false },
    create = { operation::CREATE, false, false },
)]
fn exemption_sets_differ_between_the_two_checks(op: &str, exempt_from_db_check: bool, exempt_from_version_check: bool) {
    assert_eq!(operation::DB_CHECK_EXEMPT.contains(&op), exempt_from_db_check);
    assert_eq!(operation::VERSION_CHECK_EXEMPT.contains(&op), exempt_from_version_check);
}

#[test]
fn version_compat_same_major_ok() {
    check_version_compat("1.2.0", "1.5.0").unwrap();
}

#[test]
fn version_compat_different_major_rejected() {
    let err = check_version_compat("2.0.0", "1.5.0").unwrap_err();
    assert!(matches!(err, Error::VersionMismatch { .. }));
}

#[test]
fn version_compat_server_older_minor_rejected() {
    let err = check_version_compat("1.5.0", "1.2.0").unwrap_err();
    assert!(matches!(err, Error::VersionMismatch { .. }));
}

#[test]
fn version_compat_older_client_same_major_ok() {
    check_version_compat("1.2.0", "1.2.0").unwrap();
}
