//! CLI Integration Tests
//!
//! These tests verify that the CLI commands work correctly end-to-end.
//! They test the actual binary behavior, not just the library.
//!
//! Run with:
//! ```bash
//! cargo test --test cli_integration
//! ```

use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

/// Get the path to the built binary
fn smt_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_smt"))
}

/// Run smt command and return (stdout, stderr, success)
fn run_smt(args: &[&str], db_path: &str) -> (String, String, bool) {
    let output = Command::new(smt_binary())
        .args(["-d", db_path, "-f", "json"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute smt");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

/// Run smt and parse stdout as JSON
fn run_json(args: &[&str], db_path: &str) -> (serde_json::Value, bool) {
    let (stdout, stderr, success) = run_smt(args, db_path);
    let value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("invalid JSON {:?} ({}), stderr: {}", stdout, e, stderr));
    (value, success)
}

// ============================================================================
// Database Initialization Tests
// ============================================================================

#[test]
fn test_cli_init_creates_database() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let (json, success) = run_json(&["init"], db_str);

    assert!(success, "init should succeed");
    assert_eq!(json["status"], "ok");
    assert!(db_path.exists(), "database file should be created");
}

#[test]
fn test_cli_default_path_is_tree_smt() {
    let output = Command::new(smt_binary())
        .args(["--help"])
        .output()
        .expect("Failed to execute smt");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("[default: tree.smt]"),
        "Default database path should be tree.smt, got: {}",
        stdout
    );
}

#[test]
fn test_cli_empty_root() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let (json, success) = run_json(&["root"], db_str);
    assert!(success);
    assert_eq!(json["empty"], true);
    assert_eq!(json["root"], "0".repeat(64));
}

// ============================================================================
// Key CRUD Tests
// ============================================================================

#[test]
fn test_cli_set_and_get() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let (json, success) = run_json(&["set", "alice", "100"], db_str);
    assert!(success, "set should succeed");
    assert_eq!(json["status"], "ok");
    let root = json["root"].as_str().unwrap().to_string();

    let (json, success) = run_json(&["get", "alice"], db_str);
    assert!(success, "get should succeed");
    assert_eq!(json["value"], "100");

    let (json, _) = run_json(&["root"], db_str);
    assert_eq!(json["root"], root, "root should persist between invocations");
}

#[test]
fn test_cli_get_missing_key_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "alice", "100"], db_str);
    let (json, success) = run_json(&["get", "bob"], db_str);

    assert!(!success, "get of a missing key should fail");
    assert_eq!(json["status"], "error");
}

#[test]
fn test_cli_has() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "alice", "100"], db_str);

    let (json, success) = run_json(&["has", "alice"], db_str);
    assert!(success);
    assert_eq!(json["present"], true);

    let (json, success) = run_json(&["has", "bob"], db_str);
    assert!(success);
    assert_eq!(json["present"], false);
}

#[test]
fn test_cli_set_empty_value_on_absent_key_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "a", "1"], db_str);
    let (before, _) = run_json(&["root"], db_str);

    let (json, success) = run_json(&["set", "ghost", ""], db_str);
    assert!(!success, "clearing a missing key should fail");
    assert_eq!(json["status"], "error");

    let (after, _) = run_json(&["root"], db_str);
    assert_eq!(before["root"], after["root"]);
}

#[test]
fn test_cli_delete_restores_previous_root() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let (json, _) = run_json(&["set", "b", "2"], db_str);
    let only_b = json["root"].clone();

    run_smt(&["set", "a", "1"], db_str);
    let (json, success) = run_json(&["delete", "a"], db_str);

    assert!(success, "delete should succeed");
    assert_eq!(json["root"], only_b);

    let (json, _) = run_json(&["has", "a"], db_str);
    assert_eq!(json["present"], false);
}

#[test]
fn test_cli_delete_missing_key_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let (json, success) = run_json(&["delete", "ghost"], db_str);
    assert!(!success, "delete of a missing key should fail");
    assert_eq!(json["status"], "error");

    run_smt(&["set", "a", "1"], db_str);
    let (before, _) = run_json(&["root"], db_str);
    let (_, success) = run_json(&["delete", "ghost"], db_str);
    assert!(!success);
    let (after, _) = run_json(&["root"], db_str);
    assert_eq!(before["root"], after["root"], "failed delete keeps the root");
}

#[test]
fn test_cli_hex_keys() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let (_, success) = run_json(&["--hex", "set", "deadbeef", "00ff"], db_str);
    assert!(success);

    let (json, success) = run_json(&["--hex", "get", "deadbeef"], db_str);
    assert!(success);
    assert_eq!(json["value"], "00ff");

    let (_, _, success) = run_smt(&["--hex", "get", "not-hex"], db_str);
    assert!(!success, "invalid hex should be rejected");
}

// ============================================================================
// Proof Tests
// ============================================================================

#[test]
fn test_cli_prove_membership() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "a", "1"], db_str);
    run_smt(&["set", "b", "2"], db_str);

    let (json, success) = run_json(&["prove", "a"], db_str);
    assert!(success);
    assert_eq!(json["membership"], true);
    assert!(json["proof"]["non_membership_leaf_data"].is_null());
    assert!(!json["proof"]["side_nodes"].as_array().unwrap().is_empty());
}

#[test]
fn test_cli_prove_compact() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "a", "1"], db_str);
    run_smt(&["set", "b", "2"], db_str);

    let (full, _) = run_json(&["prove", "a"], db_str);
    let (compact, success) = run_json(&["prove", "a", "--compact"], db_str);
    assert!(success);

    let full_len = full["proof"]["side_nodes"].as_array().unwrap().len();
    assert_eq!(compact["proof"]["num_side_nodes"], full_len);
    assert!(compact["proof"]["side_nodes"].as_array().unwrap().len() <= full_len);
}

#[test]
fn test_cli_prove_non_membership() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "present", "1"], db_str);

    let (json, success) = run_json(&["prove", "absent"], db_str);
    assert!(success);
    assert_eq!(json["membership"], false);
    assert!(json["proof"]["non_membership_leaf_data"].is_string());
}

// ============================================================================
// Tag Tests
// ============================================================================

#[test]
fn test_cli_tag_and_checkout() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    // Keep history so the tagged root stays walkable
    std::fs::write(
        dir.path().join("tree.smt.config"),
        r#"{"prune_orphans": false}"#,
    )
    .unwrap();

    run_smt(&["set", "a", "1"], db_str);
    let (json, success) = run_json(&["tag", "v1"], db_str);
    assert!(success);
    let v1 = json["root"].clone();

    run_smt(&["set", "a", "2"], db_str);
    let (json, _) = run_json(&["get", "a"], db_str);
    assert_eq!(json["value"], "2");

    let (json, success) = run_json(&["checkout", "v1"], db_str);
    assert!(success);
    assert_eq!(json["root"], v1);

    let (json, _) = run_json(&["get", "a"], db_str);
    assert_eq!(json["value"], "1");

    let (json, _) = run_json(&["tags"], db_str);
    assert_eq!(json["count"], 1);
    assert_eq!(json["tags"][0]["name"], "v1");
    assert_eq!(json["tags"][0]["current"], true);
}

#[test]
fn test_cli_checkout_unknown_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let (json, success) = run_json(&["checkout", "nope"], db_str);
    assert!(!success);
    assert_eq!(json["status"], "error");
}

#[test]
fn test_cli_tag_empty_name_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "a", "1"], db_str);
    let (json, success) = run_json(&["tag", ""], db_str);
    assert!(!success);
    assert_eq!(json["status"], "error");
}

#[test]
fn test_cli_untag() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "a", "1"], db_str);
    run_smt(&["tag", "v1"], db_str);

    let (_, success) = run_json(&["untag", "v1"], db_str);
    assert!(success);
    let (json, success) = run_json(&["untag", "v1"], db_str);
    assert!(!success);
    assert_eq!(json["status"], "error");
}

// ============================================================================
// Status Tests
// ============================================================================

#[test]
fn test_cli_status() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    run_smt(&["set", "a", "1"], db_str);
    let (json, success) = run_json(&["status"], db_str);

    assert!(success);
    assert_eq!(json["tags"], 0);
    assert_eq!(json["prune_orphans"], true);
    // one leaf node plus its value
    assert_eq!(json["entries"], 2);
}

#[test]
fn test_cli_text_format_is_pretty_json() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tree.smt");
    let db_str = db_path.to_str().unwrap();

    let output = Command::new(smt_binary())
        .args(["-d", db_str, "-f", "text", "root"])
        .output()
        .expect("Failed to execute smt");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("\n  \"root\""), "got: {}", stdout);
}
