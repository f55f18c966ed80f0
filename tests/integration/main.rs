//! Integration tests for the cartograph binary
//!
//! Each test builds a throwaway repository and drives the CLI against it.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use cartograph_core::test_utils::{create_repo_with_structure, create_sample_project};
use serde_json::{Value, json};

fn cartograph(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cartograph"))
        .arg("--root")
        .arg(root)
        .args(args)
        .current_dir(root)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("CARTOGRAPH_MANIFEST_DIR")
        .env_remove("CARTOGRAPH_EXCLUDE")
        .env_remove("CARTOGRAPH_STRICT")
        .env_remove("CARTOGRAPH_STALE_DAYS")
        .output()
        .expect("Failed to run cartograph")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn manifest(root: &Path, name: &str) -> Value {
    let text = fs::read_to_string(root.join(".cartograph").join(name)).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_cli_invocation() {
    let dir = create_repo_with_structure(&[]);
    let help = cartograph(dir.path(), &["--help"]);
    assert!(help.status.success());
    assert!(stdout(&help).contains("Codebase intelligence manifests"));

    let version = cartograph(dir.path(), &["version"]);
    assert!(stdout(&version).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_empty_repository() {
    let dir = create_repo_with_structure(&[]);
    let root = dir.path();

    let before = cartograph(root, &["status"]);
    assert_eq!(before.status.code(), Some(2));
    assert!(stdout(&before).contains("MISSING"));

    let update = cartograph(root, &["update"]);
    assert!(update.status.success(), "{}", String::from_utf8_lossy(&update.stderr));

    let symbols = manifest(root, "symbols.json");
    assert_eq!(symbols["totalSymbols"], 0);
    assert_eq!(symbols["_metadata"]["version"], 1);
    assert_eq!(symbols["_metadata"]["autoGenerated"], true);

    let after = cartograph(root, &["status"]);
    assert_eq!(after.status.code(), Some(0));
    assert!(stdout(&after).contains("CURRENT"));
    assert!(stdout(&after).contains("0%"));
}

#[test]
fn test_sample_project_manifests() {
    let dir = create_sample_project();
    let root = dir.path();
    let update = cartograph(root, &["update"]);
    assert!(update.status.success());
    assert!(stdout(&update).contains("Scanned 3 files"));

    let symbols = manifest(root, "symbols.json");
    let user = symbols["files"]["src/services/user.ts"].as_array().unwrap();
    assert!(user.iter().any(|s| s["qualifiedName"] == "UserService.loadUsers"));
    assert!(symbols["files"].get("node_modules/react/index.js").is_none());
    assert!(symbols["files"].get("dist/index.js").is_none());

    let stack = manifest(root, "tech-stack.json");
    assert_eq!(stack["language"], "TypeScript");
    assert_eq!(stack["testingFramework"], "vitest");
    assert_eq!(stack["bundler"], "vite");
    assert_eq!(stack["linter"], "eslint");

    let api = manifest(root, "api-surface.json");
    assert_eq!(api["entryPoints"], json!(["src/index.ts"]));
    assert_eq!(api["cliCommands"], json!(["sample"]));

    let markdown = fs::read_to_string(root.join(".cartograph/symbols.md")).unwrap();
    assert!(markdown.starts_with("# Symbol Registry"));
    assert!(markdown.contains("formatName"));
    assert!(root.join(".cartograph/patterns.md").is_file());
}

#[test]
fn test_manual_region_survives_updates() {
    let dir = create_repo_with_structure(&[("src/a.ts", "export function a() {}\n")]);
    let root = dir.path();
    assert!(cartograph(root, &["update"]).status.success());

    let path = root.join(".cartograph/symbols.json");
    let mut doc = manifest(root, "symbols.json");
    doc["_manual"] = json!({ "notes": "keep" });
    fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    fs::write(root.join("src/b.ts"), "export async function b() {}\n").unwrap();

    for _ in 0..3 {
        assert!(cartograph(root, &["refresh"]).status.success());
    }
    let doc = manifest(root, "symbols.json");
    assert_eq!(doc["_manual"]["notes"], "keep");
    assert_eq!(doc["_metadata"]["version"], 4);
    assert_eq!(doc["files"]["src/b.ts"][0]["isAsync"], true);
}

#[test]
fn test_auto_region_is_idempotent() {
    let dir = create_sample_project();
    let root = dir.path();
    assert!(cartograph(root, &["update"]).status.success());
    let strip = |mut v: Value| {
        v.as_object_mut().unwrap().remove("_metadata");
        v
    };
    let first = strip(manifest(root, "exports.json"));
    assert!(cartograph(root, &["update"]).status.success());
    let second = manifest(root, "exports.json");
    assert_eq!(second["_metadata"]["version"], 2);
    assert_eq!(second["_metadata"]["changesSinceLastUpdate"], 0);
    assert_eq!(strip(second), first);
}

#[test]
fn test_corrupt_manifest_does_not_block_update() {
    let dir = create_repo_with_structure(&[("a.ts", "export function a() {}\n")]);
    let root = dir.path();
    fs::create_dir_all(root.join(".cartograph")).unwrap();
    fs::write(root.join(".cartograph/imports.json"), "{ oops").unwrap();

    let status = cartograph(root, &["status", "--strict"]);
    assert_eq!(status.status.code(), Some(2));
    assert!(stdout(&status).contains("STALE(unreadable"));

    let create = cartograph(root, &["create"]);
    assert!(create.status.success());
    assert_eq!(fs::read_to_string(root.join(".cartograph/imports.json")).unwrap(), "{ oops");

    let update = cartograph(root, &["update"]);
    assert!(update.status.success());
    assert!(stdout(&update).contains("rebuilt"));
    assert_eq!(manifest(root, "imports.json")["_metadata"]["version"], 1);
    assert_eq!(
        fs::read_to_string(root.join(".cartograph/imports.json.corrupt")).unwrap(),
        "{ oops"
    );
}

#[test]
fn test_update_only_selected_manifests() {
    let dir = create_repo_with_structure(&[("a.ts", "export function a() {}\n")]);
    let root = dir.path();
    assert!(cartograph(root, &["update"]).status.success());
    assert!(cartograph(root, &["update", "--only", "patterns,tech_stack"]).status.success());

    assert_eq!(manifest(root, "patterns.json")["_metadata"]["version"], 2);
    assert_eq!(manifest(root, "tech-stack.json")["_metadata"]["version"], 2);
    assert_eq!(manifest(root, "symbols.json")["_metadata"]["version"], 1);

    let bad = cartograph(root, &["update", "--only", "nonsense"]);
    assert!(!bad.status.success());
}

#[test]
fn test_config_file_and_flags() {
    let dir = create_repo_with_structure(&[
        ("cartograph.toml", "manifest_dir = \"docs/manifests\"\nexclude = [\"generated/**\"]\n"),
        ("src/a.ts", "export function a() {}\n"),
        ("generated/b.ts", "export function b() {}\n"),
        ("legacy/c.ts", "export function c() {}\n"),
    ]);
    let root = dir.path();
    assert!(cartograph(root, &["update", "--exclude", "legacy/**"]).status.success());

    let text = fs::read_to_string(root.join("docs/manifests/symbols.json")).unwrap();
    let symbols: Value = serde_json::from_str(&text).unwrap();
    let files: Vec<_> = symbols["files"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(files, vec!["src/a.ts"]);
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(root: &Path, args: &[&str], date: Option<&str>) {
    let mut command = Command::new("git");
    command
        .arg("-C")
        .arg(root)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args);
    if let Some(date) = date {
        command.env("GIT_AUTHOR_DATE", date).env("GIT_COMMITTER_DATE", date);
    }
    let output = command.output().unwrap();
    assert!(output.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_git_history_makes_manifests_stale() {
    if !git_available() {
        return;
    }
    let dir = create_repo_with_structure(&[
        (".gitignore", ".cartograph/\n"),
        ("src/a.ts", "export function a() {}\n"),
    ]);
    let root = dir.path();
    git(root, &["init", "-q"], None);
    git(root, &["add", "."], None);
    git(root, &["commit", "-q", "-m", "initial"], None);

    assert!(cartograph(root, &["update"]).status.success());
    let clean = cartograph(root, &["status", "--strict"]);
    assert_eq!(clean.status.code(), Some(0), "{}", stdout(&clean));

    // Committed after the manifests were written.
    let later = chrono_like_future();
    fs::write(root.join("src/b.ts"), "export function b() {}\n").unwrap();
    git(root, &["add", "."], Some(&later));
    git(root, &["commit", "-q", "-m", "add b"], Some(&later));

    let stale = cartograph(root, &["status"]);
    assert_eq!(stale.status.code(), Some(0));
    let out = stdout(&stale);
    assert!(out.contains("STALE(1 missing items)"), "{}", out);
    assert!(out.contains("missing: src/b.ts"));

    let strict = cartograph(root, &["status", "--strict"]);
    assert_eq!(strict.status.code(), Some(1));

    let update = cartograph(root, &["update"]);
    assert!(stdout(&update).contains("1 changes"));
    assert_eq!(manifest(root, "symbols.json")["_metadata"]["changesSinceLastUpdate"], 1);
}

/// A git date one hour from now.
fn chrono_like_future() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    format!("@{} +0000", now + 3600)
}
