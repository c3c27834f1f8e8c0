//! Tests for config file discovery: search order, formats, package.json
//! handling and fatal validation.

use std::fs;
use std::path::Path;

use live_counting_bridge::config::{self, DEFAULT_GATEWAY};
use live_counting_bridge::error::ConfigError;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[test]
fn test_config_json() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "config.json",
        r#"{"apiBase": "http://bridge:4242", "token": "t", "threads": [["abc", "main"], ["def"]]}"#,
    );

    let cfg = config::load_from(dir.path()).unwrap();
    assert_eq!(cfg.api_base, "http://bridge:4242");
    assert_eq!(cfg.token.as_deref(), Some("t"));
    assert_eq!(cfg.threads.len(), 2);
    assert_eq!(cfg.threads[0].id, "abc");
    assert_eq!(cfg.threads[0].gateway, "main");
    assert_eq!(cfg.threads[1].gateway, DEFAULT_GATEWAY);
}

#[test]
fn test_rc_file_is_yaml() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".live-counting-bridgerc",
        "apiBase: http://bridge\nthreads:\n  - [abc, main]\n  - [def]\n",
    );

    let cfg = config::load_from(dir.path()).unwrap();
    assert_eq!(cfg.api_base, "http://bridge");
    assert_eq!(cfg.threads[0].gateway, "main");
    assert_eq!(cfg.threads[1].id, "def");
}

#[test]
fn test_rc_file_accepts_json() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), ".live-counting-bridgerc", r#"{"apiBase": "http://bridge", "threads": []}"#);
    assert_eq!(config::load_from(dir.path()).unwrap().api_base, "http://bridge");
}

#[test]
fn test_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "live-counting-bridge.toml",
        "apiBase = \"http://bridge\"\nplatformBase = \"http://platform\"\nthreads = [[\"abc\", \"main\"], [\"def\"]]\n",
    );

    let cfg = config::load_from(dir.path()).unwrap();
    assert_eq!(cfg.platform_base, "http://platform");
    assert_eq!(cfg.threads[0].gateway, "main");
    assert_eq!(cfg.threads[1].gateway, DEFAULT_GATEWAY);
}

// ---------------------------------------------------------------------------
// Search order
// ---------------------------------------------------------------------------

#[test]
fn test_package_json_key_wins() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "package.json",
        r#"{"name": "x", "live-counting-bridge": {"apiBase": "http://from-package"}}"#,
    );
    write(dir.path(), "config.json", r#"{"apiBase": "http://from-config"}"#);

    assert_eq!(config::load_from(dir.path()).unwrap().api_base, "http://from-package");
}

#[test]
fn test_package_json_without_key_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "package.json", r#"{"name": "x", "version": "1.0.0"}"#);
    write(dir.path(), "config.json", r#"{"apiBase": "http://from-config"}"#);

    assert_eq!(config::load_from(dir.path()).unwrap().api_base, "http://from-config");
}

#[test]
fn test_package_json_null_key_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "package.json", r#"{"name": "x", "live-counting-bridge": null}"#);
    write(dir.path(), "config.json", r#"{"apiBase": "http://from-config"}"#);

    assert_eq!(config::load_from(dir.path()).unwrap().api_base, "http://from-config");
}

#[test]
fn test_config_json_before_rc_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", r#"{"apiBase": "http://json"}"#);
    write(dir.path(), ".live-counting-bridgerc.yml", "apiBase: http://yml\n");

    assert_eq!(config::load_from(dir.path()).unwrap().api_base, "http://json");
}

#[test]
fn test_parent_directory_is_searched() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();
    write(dir.path(), ".live-counting-bridgerc.json", r#"{"apiBase": "http://parent"}"#);

    assert_eq!(config::load_from(&nested).unwrap().api_base, "http://parent");
}

#[test]
fn test_nearer_directory_wins() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("child");
    fs::create_dir_all(&nested).unwrap();
    write(dir.path(), "config.json", r#"{"apiBase": "http://parent"}"#);
    write(&nested, ".live-counting-bridgerc.yaml", "apiBase: http://child\n");

    assert_eq!(config::load_from(&nested).unwrap().api_base, "http://child");
}

// ---------------------------------------------------------------------------
// Fatal cases
// ---------------------------------------------------------------------------

#[test]
fn test_missing_api_base_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", r#"{"threads": [["abc"]]}"#);
    assert!(matches!(config::load_from(dir.path()), Err(ConfigError::MissingApiBase)));
}

#[test]
fn test_threads_not_sequence_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", r#"{"apiBase": "http://b", "threads": "abc"}"#);
    assert!(matches!(config::load_from(dir.path()), Err(ConfigError::ThreadsNotSequence)));
}

#[test]
fn test_unparseable_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config.json", "{ apiBase: ");
    assert!(matches!(config::load_from(dir.path()), Err(ConfigError::Parse { .. })));
}

// ---------------------------------------------------------------------------
// Explicit path
// ---------------------------------------------------------------------------

#[test]
fn test_explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bridge.yml");
    fs::write(&file, "apiBase: http://explicit\nthreads: [[abc]]\n").unwrap();

    let cfg = config::load(Some(file.as_path())).unwrap();
    assert_eq!(cfg.api_base, "http://explicit");
    assert_eq!(cfg.threads[0].id, "abc");
}

#[test]
fn test_explicit_missing_path_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("nope.json");
    assert!(matches!(config::load(Some(file.as_path())), Err(ConfigError::NotFound(_))));
}

#[test]
fn test_explicit_package_json_uses_key() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("package.json");
    fs::write(&file, r#"{"live-counting-bridge": {"apiBase": "http://pkg"}}"#).unwrap();
    assert_eq!(config::load(Some(file.as_path())).unwrap().api_base, "http://pkg");
}
