//! Command-line behaviour of the `codedigest` binary

use std::process::Command;

use assert_fs::prelude::*;
use predicates::prelude::*;

fn codedigest() -> Command {
    Command::new(env!("CARGO_BIN_EXE_codedigest"))
}

const RECORD: &str = r#"{
    "path": "app.py",
    "language": "python",
    "symbols": [
        { "name": "main", "kind": "function", "span": { "startLine": 1 } },
        { "name": "work", "kind": "function", "span": { "startLine": 5 } }
    ],
    "calls": [{ "caller": "main", "callee": "work", "span": { "startLine": 2 } }]
}"#;

#[test]
fn analyze_writes_an_export_envelope() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("records/app.json").write_str(RECORD).unwrap();
    let output = temp.child("out/analysis.json");

    let status = codedigest()
        .current_dir(temp.path())
        .args(["analyze", "records", "-o"])
        .arg(output.path())
        .args(["--max-depth", "3", "--compact"])
        .status()
        .unwrap();
    assert!(status.success());

    output.assert(predicate::path::exists());
    output.assert(predicate::str::contains("\"generatedAt\""));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(output.path()).unwrap()).unwrap();
    assert_eq!(json["metadata"]["tool"], "codedigest");
    assert_eq!(json["metadata"]["fingerprint"].as_str().map(str::len), Some(64));
    assert_eq!(json["analysis"]["flows"][0]["name"], "main_flow");
}

#[test]
fn analyze_prints_to_stdout_without_output_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("app.json").write_str(RECORD).unwrap();

    let output = codedigest()
        .current_dir(temp.path())
        .args(["analyze", "app.json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(predicate::str::starts_with("{").eval(stdout.trim_start()));
    assert!(predicate::str::contains("\"filteredGraph\"").eval(&stdout));
}

#[test]
fn init_then_check_config() {
    let temp = assert_fs::TempDir::new().unwrap();

    let status = codedigest().current_dir(temp.path()).arg("init").status().unwrap();
    assert!(status.success());
    temp.child("codedigest.toml").assert(predicate::str::contains("[flows]"));

    let status = codedigest().current_dir(temp.path()).arg("init").status().unwrap();
    assert!(!status.success());

    let status = codedigest().current_dir(temp.path()).arg("check-config").status().unwrap();
    assert!(status.success());
}

#[test]
fn invalid_config_fails_before_analysis() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("app.json").write_str(RECORD).unwrap();
    temp.child("bad.toml").write_str("[flows]\nmax_depth = 0\n").unwrap();

    let output = codedigest()
        .current_dir(temp.path())
        .args(["--config", "bad.toml", "analyze", "app.json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(predicate::str::contains("max_depth").eval(&String::from_utf8_lossy(&output.stderr)));
}
