//! Loading record files from disk and analyzing them

use assert_fs::prelude::*;
use predicates::prelude::*;

use codedigest::config::{Config, InputConfig};
use codedigest::core::call_graph::{AnalysisEngine, SkipReason};
use codedigest::core::{ConfigOverrides, Engine, RecordLoader};

const MAIN_RECORD: &str = r#"{
    "path": "app/main.py",
    "language": "python",
    "symbols": [{ "name": "main", "kind": "function", "span": { "startLine": 1, "startCol": 0, "endLine": 3, "endCol": 0 } }],
    "imports": [{ "target": "app.service.process" }],
    "calls": [{ "caller": "main", "callee": "process", "span": { "startLine": 2, "startCol": 4, "endLine": 2, "endCol": 13 } }]
}"#;

const SERVICE_BUNDLE: &str = r#"[
    {
        "path": "app/service.py",
        "language": "python",
        "symbols": [{ "name": "process", "kind": "function", "span": { "startLine": 1 } }],
        "calls": [{ "caller": "process", "callee": "print", "span": { "startLine": 2 } }]
    },
    {
        "path": "app/models.py",
        "language": "python",
        "symbols": [{ "name": "Order", "kind": "class", "fields": ["id", "total", "status"] }]
    }
]"#;

#[tokio::test]
async fn directory_of_records_is_loaded_and_analyzed() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("records/main.json").write_str(MAIN_RECORD).unwrap();
    temp.child("records/nested/service.json").write_str(SERVICE_BUNDLE).unwrap();
    temp.child("records/broken.json").write_str("{ \"path\": ").unwrap();
    temp.child("records/README.md").write_str("# not a record").unwrap();

    let loaded = RecordLoader::new(&InputConfig::default())
        .load_path(temp.child("records").path())
        .await
        .unwrap();
    assert_eq!(loaded.files.len(), 3);
    assert_eq!(loaded.skipped.len(), 1);
    assert_eq!(loaded.skipped[0].reason, SkipReason::Malformed);
    assert!(predicate::str::ends_with("broken.json").eval(&loaded.skipped[0].path.to_string_lossy()));

    let result = AnalysisEngine::new(&Config::default())
        .unwrap()
        .run(loaded.files, loaded.skipped);
    assert_eq!(result.summary().files_analyzed, 3);
    assert_eq!(result.summary().files_skipped, 1);
    assert_eq!(result.entrypoints()[0].qualified_name, "app.main.main");
    assert_eq!(result.domain_entities().len(), 1);
    assert_eq!(result.domain_entities()[0].category, "Order");
}

#[tokio::test]
async fn ignore_files_hide_records_when_enabled() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("main.json").write_str(MAIN_RECORD).unwrap();
    temp.child("generated/service.json").write_str(SERVICE_BUNDLE).unwrap();
    temp.child(".ignore").write_str("generated/\n").unwrap();

    let respecting = RecordLoader::new(&InputConfig::default());
    assert_eq!(respecting.discover(temp.path()).len(), 1);

    let everything = RecordLoader::new(&InputConfig {
        respect_ignore_files: false,
        ..InputConfig::default()
    });
    assert_eq!(everything.discover(temp.path()).len(), 2);
}

#[tokio::test]
async fn engine_runs_from_disk_with_overrides() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("main.json").write_str(MAIN_RECORD).unwrap();
    temp.child("bundle.json").write_str(SERVICE_BUNDLE).unwrap();

    let engine = Engine::with_config(Config::default());
    let overrides = ConfigOverrides {
        no_noise_filter: true,
        ..ConfigOverrides::default()
    };
    let result = engine.run_analysis(temp.path(), &overrides).await.unwrap();

    assert_eq!(result.filtered_graph(), result.full_graph());
    assert!(result.filtered_graph().edges().iter().any(|e| e.callee.is_unresolved()));
}
