//! CLI end-to-end tests.
//!
//! These tests spawn the actual `atlas` binary and validate stdout/exit codes.
//!
//! Exit code expectations:
//! - 0: Success
//! - 1: A package failed (including a root that does not exist)
//! - 2: Invalid arguments
//! - 3: Package or symbol not found

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run atlas with given arguments and return (stdout, stderr, exit_code).
fn run_atlas(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_atlas"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute atlas");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_package(root: &Path) {
    let pkg = root.join("pkg");
    write(&pkg.join("__init__.py"), "from ._impl import *\n");
    write(
        &pkg.join("_impl.py"),
        "class Window:\n    \"\"\"A window.\"\"\"\n\n    def show(self):\n        self.layout()\n\n    def layout(self):\n        pass\n",
    );
}

fn scan_into(tmp: &TempDir) -> String {
    sample_package(tmp.path());
    let root = tmp.path().join("pkg");
    let out = tmp.path().join("out");
    let (stdout, stderr, code) = run_atlas(&[
        "scan",
        root.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    let json: Value = serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["packages"][0]["package"], "pkg");
    out.to_str().unwrap().to_string()
}

// ============================================================================
// Scan
// ============================================================================

#[test]
fn scan_writes_atlas_and_summary() {
    let tmp = TempDir::new().unwrap();
    let out = scan_into(&tmp);
    let atlas: Value =
        serde_json::from_str(&fs::read_to_string(Path::new(&out).join("pkg.json")).unwrap())
            .unwrap();
    assert!(atlas["classes"]["pkg.Window"].is_object());
    assert!(atlas["classes"]["pkg._impl.Window"].is_object());
    assert_eq!(
        atlas["used_classes"]["pkg._impl.Window.layout"][0],
        "pkg._impl.Window.show"
    );
}

#[test]
fn scan_missing_root_reports_failed_package() {
    let tmp = TempDir::new().unwrap();
    sample_package(tmp.path());
    let root = tmp.path().join("pkg");
    let missing = tmp.path().join("nowhere");
    let (stdout, _stderr, code) = run_atlas(&[
        "scan",
        root.to_str().unwrap(),
        missing.to_str().unwrap(),
    ]);
    assert_eq!(code, 1);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["status"], "partial");
    let packages = json["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 2);
    let nowhere = packages.iter().find(|p| p["package"] == "nowhere").unwrap();
    assert_eq!(nowhere["status"], "failed");
    assert_eq!(nowhere["diagnostics"], 1);
    let pkg = packages.iter().find(|p| p["package"] == "pkg").unwrap();
    assert_eq!(pkg["status"], "ok");
}

#[test]
fn scan_bad_config_exits_2() {
    let tmp = TempDir::new().unwrap();
    sample_package(tmp.path());
    let config = tmp.path().join("atlas.toml");
    fs::write(&config, "parse_timeout_ms = \"soon\"\n").unwrap();
    let (_stdout, _stderr, code) = run_atlas(&[
        "scan",
        tmp.path().join("pkg").to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_eq!(code, 2);
}

// ============================================================================
// Lookup / Search
// ============================================================================

#[test]
fn lookup_by_reference() {
    let tmp = TempDir::new().unwrap();
    let out = scan_into(&tmp);
    let (stdout, _stderr, code) =
        run_atlas(&["lookup", "--store", &out, "--package", "pkg", "pkg@Window"]);
    assert_eq!(code, 0);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["kind"], "class");
    assert_eq!(json["key"], "pkg.Window");
    assert_eq!(json["entry"]["doc_comment"], "A window.");
}

#[test]
fn lookup_unknown_symbol_exits_3() {
    let tmp = TempDir::new().unwrap();
    let out = scan_into(&tmp);
    let (stdout, _stderr, code) =
        run_atlas(&["lookup", "--store", &out, "--package", "pkg", "pkg@Nope"]);
    assert_eq!(code, 3);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["error"]["code"], 3);
}

#[test]
fn search_prefix_and_fuzzy() {
    let tmp = TempDir::new().unwrap();
    let out = scan_into(&tmp);

    let (stdout, _stderr, code) = run_atlas(&[
        "search", "--store", &out, "--package", "pkg", "pkg._impl", "--prefix",
    ]);
    assert_eq!(code, 0);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["hits"][0]["key"], "pkg._impl");

    let (stdout, _stderr, code) = run_atlas(&[
        "search", "--store", &out, "--package", "pkg", "LAYOUT", "--limit", "1",
    ]);
    assert_eq!(code, 0);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    let hits = json["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0]["key"].as_str().unwrap().ends_with(".layout"));
}
