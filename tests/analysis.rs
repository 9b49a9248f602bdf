//! End-to-end analysis over in-memory front-end records
//!
//! Covers cross-file resolution, unresolved calls, same-named classes, cyclic graphs,
//! determinism under input reordering and JSON round trips.

use std::collections::HashSet;

use codedigest::config::Config;
use codedigest::core::call_graph::{
    AnalysisEngine, AnalysisResult, Callee, EntryPointType, FlowTermination, ResolutionKind, SymbolId,
};
use codedigest::core::SourceFile;

fn analyze(files: Vec<SourceFile>) -> AnalysisResult {
    AnalysisEngine::new(&Config::default()).unwrap().analyze(files)
}

fn id(result: &AnalysisResult, qualified_name: &str) -> SymbolId {
    result
        .symbols()
        .lookup(qualified_name)
        .unwrap_or_else(|| panic!("missing symbol {}", qualified_name))
}

fn names(result: &AnalysisResult, steps: &[SymbolId]) -> Vec<String> {
    steps
        .iter()
        .map(|s| result.symbols().qualified_name(*s).to_string())
        .collect()
}

fn three_file_project() -> Vec<SourceFile> {
    vec![
        SourceFile::new("app/main.py", "python")
            .with_import(None, "app.service.process")
            .with_symbol("main", "function", 3)
            .with_call("main", "process", 4)
            .with_call("<module>", "main", 10),
        SourceFile::new("app/service.py", "python")
            .with_import(Some("storage"), "app.storage")
            .with_symbol("process", "function", 2)
            .with_call("process", "storage.save", 3)
            .with_call("process", "len", 4),
        SourceFile::new("app/storage.py", "python").with_symbol("save", "function", 1),
    ]
}

#[test]
fn cross_file_chain_resolves_into_a_single_flow() {
    let files = vec![
        SourceFile::new("app/main.py", "python")
            .with_import(None, "app.service.process")
            .with_symbol("main", "function", 3)
            .with_call("main", "process", 4),
        SourceFile::new("app/service.py", "python")
            .with_import(None, "app.storage.save")
            .with_symbol("process", "function", 2)
            .with_call("process", "save", 3),
        SourceFile::new("app/storage.py", "python").with_symbol("save", "function", 1),
    ];
    let result = analyze(files);

    let main = id(&result, "app.main.main");
    let process = id(&result, "app.service.process");
    let save = id(&result, "app.storage.save");

    let edges: Vec<(SymbolId, Callee, f64)> = result
        .full_graph()
        .edges()
        .iter()
        .map(|e| (e.caller, e.callee.clone(), e.confidence))
        .collect();
    assert_eq!(
        edges,
        vec![(main, Callee::Symbol(process), 1.0), (process, Callee::Symbol(save), 1.0)]
    );

    assert_eq!(result.entrypoints().len(), 1);
    assert_eq!(result.entrypoints()[0].symbol, main);
    assert_eq!(result.entrypoints()[0].entry_type, EntryPointType::Main);

    assert_eq!(result.flows().len(), 1);
    assert_eq!(result.flows()[0].steps, vec![main, process, save]);
    assert_eq!(result.flows()[0].termination, FlowTermination::Leaf);
    assert_eq!(result.flows()[0].files.len(), 3);
}

#[test]
fn unknown_callee_stays_in_the_full_graph_only() {
    let files = vec![SourceFile::new("web/app.js", "javascript")
        .with_symbol("load", "function", 1)
        .with_symbol("render", "function", 8)
        .with_call("load", "fetchData", 2)
        .with_call("load", "render", 3)];
    let result = analyze(files);

    let unresolved: Vec<_> = result
        .full_graph()
        .edges()
        .iter()
        .filter(|e| e.callee.is_unresolved())
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].callee, Callee::Unresolved("fetchData".to_string()));
    assert_eq!(unresolved[0].confidence, 0.0);
    assert!(unresolved[0].builtin);
    assert_eq!(unresolved[0].resolution, ResolutionKind::External);

    assert!(result.filtered_graph().edges().iter().all(|e| !e.callee.is_unresolved()));
    assert_eq!(result.full_graph().statistics().unresolved_edges, 1);
    assert_eq!(result.full_graph().statistics().unresolved_calls, 1);
    assert_eq!(result.filtered_graph().statistics().unresolved_edges, 0);
}

#[test]
fn same_short_name_in_two_modules_gives_two_symbols() {
    let class = |path: &str| {
        let mut file = SourceFile::new(path, "python").with_symbol("User", "class", 1);
        file.symbols[0].fields = vec!["id".to_string(), "email".to_string()];
        file
    };
    let result = analyze(vec![class("module_b.py"), class("module_a.py")]);

    let a = id(&result, "module_a.User");
    let b = id(&result, "module_b.User");
    assert_ne!(a, b);
    assert!(a < b);

    let entities: Vec<SymbolId> = result.domain_entities().iter().map(|e| e.symbol).collect();
    assert_eq!(entities, vec![a, b]);
    assert!(result.domain_entities().iter().all(|e| e.category == "User"));
}

#[test]
fn cyclic_graph_falls_back_to_one_entrypoint_and_terminates() {
    let files = vec![SourceFile::new("loop.py", "python")
        .with_symbol("A", "function", 1)
        .with_symbol("B", "function", 5)
        .with_symbol("C", "function", 9)
        .with_call("A", "B", 2)
        .with_call("B", "C", 6)
        .with_call("C", "A", 10)];
    let result = analyze(files);

    assert_eq!(result.entrypoints().len(), 1);
    assert!(result.entrypoints()[0].fallback);
    assert_eq!(result.entrypoints()[0].qualified_name, "loop.A");

    assert_eq!(result.flows().len(), 1);
    assert_eq!(names(&result, &result.flows()[0].steps), vec!["loop.A", "loop.B", "loop.C"]);
    assert_eq!(result.flows()[0].termination, FlowTermination::Cycle);
    assert_eq!(result.full_graph().statistics().cycles, 1);
}

#[test]
fn reordered_input_produces_identical_output() {
    let forward = analyze(three_file_project());

    let mut shuffled = three_file_project();
    shuffled.reverse();
    shuffled.rotate_left(1);
    for file in &mut shuffled {
        file.symbols.reverse();
    }
    let reordered = analyze(shuffled);

    assert_eq!(forward.to_json(false).unwrap(), reordered.to_json(false).unwrap());
    assert_eq!(forward.fingerprint().unwrap(), reordered.fingerprint().unwrap());
}

#[test]
fn json_round_trip_keeps_symbols_and_edges() {
    let result = analyze(three_file_project());
    let json = result.to_json(true).unwrap();
    let restored = AnalysisResult::from_json(&json).unwrap();

    assert_eq!(restored.symbols(), result.symbols());

    let edge_set = |r: &AnalysisResult| -> Vec<(SymbolId, Callee, u32)> {
        r.full_graph()
            .edges()
            .iter()
            .map(|e| (e.caller, e.callee.clone(), e.weight))
            .collect()
    };
    assert_eq!(edge_set(&restored), edge_set(&result));
    assert_eq!(restored.full_graph().statistics(), result.full_graph().statistics());
    assert_eq!(restored.flows(), result.flows());

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    for field in ["symbols", "fullGraph", "filteredGraph", "entrypoints", "flows", "domainEntities", "skippedFiles"] {
        assert!(value.get(field).is_some(), "missing field {}", field);
    }
}

#[test]
fn flows_respect_depth_and_never_repeat_symbols() {
    let mut file = SourceFile::new("mesh.py", "python").with_symbol("main", "function", 1);
    for i in 0..8u32 {
        file = file.with_symbol(&format!("n{}", i), "function", 10 + i);
        file = file.with_call("main", &format!("n{}", i), 2);
        file = file.with_call(&format!("n{}", i), &format!("n{}", (i + 1) % 8), 10 + i);
        file = file.with_call(&format!("n{}", i), &format!("n{}", (i + 3) % 8), 10 + i);
    }

    let mut config = Config::default();
    config.flows.max_depth = 4;
    let result = AnalysisEngine::new(&config).unwrap().analyze(vec![file]);

    assert!(!result.flows().is_empty());
    for flow in result.flows() {
        assert!(flow.steps.len() <= 4);
        let unique: HashSet<_> = flow.steps.iter().collect();
        assert_eq!(unique.len(), flow.steps.len());
        assert!(flow.steps.iter().all(|s| result.filtered_graph().contains(*s)));
    }
    assert!(result.flows().len() <= 3 * result.entrypoints().len());
}

#[test]
fn module_level_code_and_crud_helpers_are_reported() {
    let result = analyze(three_file_project());
    let module = id(&result, "app.main.<module>");

    let entry_symbols: Vec<SymbolId> = result.entrypoints().iter().map(|e| e.symbol).collect();
    assert!(entry_symbols.contains(&module));
    assert!(result.filtered_graph().contains(module));

    let crud = analyze(vec![SourceFile::new("repo.py", "python")
        .with_symbol("create_order", "function", 1)
        .with_symbol("get_order", "function", 5)
        .with_symbol("delete_order", "function", 9)]);
    assert_eq!(crud.patterns().len(), 1);
    assert_eq!(crud.summary().pattern_count, 1);
}
