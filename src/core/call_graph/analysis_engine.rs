// src/core/call_graph/analysis_engine.rs
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::Config;
use crate::core::records::SourceFile;
use crate::error::Result;
use super::diagnostics::{count_dropped_files, normalize_skipped};
use super::scoring::round_score;
use super::{
    BehaviorPattern, CallGraph, CallGraphBuilder, CallGraphStats, Diagnostics, DomainEntity,
    DomainEntityDetector, EntryPoint, EntryPointDetector, ExecutionFlow, FlowTracer, NoiseFilter,
    PatternDetector, ReferenceResolver, SkipReason, SkippedFile, SymbolKind, SymbolTable,
    SymbolTableBuilder,
};

/// Runs the analysis pipeline over front-end records
pub struct AnalysisEngine {
    noise_filter: NoiseFilter,
    entry_point_detector: EntryPointDetector,
    flow_tracer: FlowTracer,
    entity_detector: DomainEntityDetector,
    pattern_detector: PatternDetector,
    max_depth: usize,
}

/// Immutable output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    symbols: SymbolTable,
    full_graph: CallGraph,
    filtered_graph: CallGraph,
    entrypoints: Vec<EntryPoint>,
    flows: Vec<ExecutionFlow>,
    domain_entities: Vec<DomainEntity>,
    skipped_files: Vec<SkippedFile>,
    #[serde(default)]
    patterns: Vec<BehaviorPattern>,
    #[serde(default)]
    diagnostics: Diagnostics,
    #[serde(default)]
    summary: AnalysisSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolCounts {
    pub total: usize,
    pub functions: usize,
    pub methods: usize,
    pub classes: usize,
    pub modules: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub files_analyzed: usize,
    /// Files dropped entirely (unreadable, malformed, duplicate)
    pub files_skipped: usize,
    /// Files analyzed with some records dropped
    pub partial_files: usize,
    /// Analyzed files per language tag
    pub languages: BTreeMap<String, usize>,
    pub symbols: SymbolCounts,
    pub full_graph: CallGraphStats,
    pub filtered_graph: CallGraphStats,
    pub entrypoint_count: usize,
    pub flow_count: usize,
    pub domain_entity_count: usize,
    pub pattern_count: usize,
    /// Symbols on the longest call chain of the filtered graph, independent of the flow depth bound
    pub max_call_depth: usize,
    /// 0-100, grows with size and call depth
    pub complexity_score: f64,
}

impl AnalysisEngine {
    /// Fails only when the configuration is invalid
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            noise_filter: NoiseFilter::new(config.noise_filter.enabled),
            entry_point_detector: EntryPointDetector::new(&config.entrypoints)?,
            flow_tracer: FlowTracer::new(config.flows.max_depth, config.flows.max_flows_per_entrypoint),
            entity_detector: DomainEntityDetector::new(&config.entities)?,
            pattern_detector: PatternDetector::new(),
            max_depth: config.flows.max_depth,
        })
    }

    /// Analyze already-parsed records
    pub fn analyze(&self, files: Vec<SourceFile>) -> AnalysisResult {
        self.run(files, Vec::new())
    }

    /// Analyze records; `skipped` carries files the loader could not turn into records
    pub fn run(&self, files: Vec<SourceFile>, skipped: Vec<SkippedFile>) -> AnalysisResult {
        let start_time = std::time::Instant::now();
        info!("🔍 Starting analysis of {} record files...", files.len());

        // Step 1: Build the symbol table
        info!("📖 Building symbol table...");
        let build = SymbolTableBuilder::new().build(files);
        info!("Found {} symbols in {} files", build.table.len(), build.files.len());

        // Step 2: Resolve call sites
        info!("🔗 Resolving references...");
        let resolution = ReferenceResolver::new(&build.table).resolve_all(&build.files);

        // Step 3: Build the call graph
        info!("🕸️ Building call graph...");
        let full_graph = CallGraphBuilder::new().build(&build.table, &resolution.calls);
        let full_stats = full_graph.statistics().clone();
        info!(
            "Built call graph: {} symbols, {} edges ({} unresolved), {} cycles detected",
            full_stats.node_count, full_stats.edge_count, full_stats.unresolved_edges, full_stats.cycles
        );

        // Step 4: Filter noise
        let filtered_graph = self.noise_filter.apply(&full_graph, &build.table);

        // Step 5: Detect entry points
        info!("🚪 Detecting entry points...");
        let entrypoints = self.entry_point_detector.detect_entry_points(&filtered_graph, &build.table);
        info!("Found {} entry points", entrypoints.len());

        // Step 6: Trace flows
        info!("🧭 Tracing execution flows (max depth: {})...", self.max_depth);
        let flows = self.flow_tracer.trace_all(&filtered_graph, &build.table, &entrypoints);
        info!("Traced {} execution flows", flows.len());

        // Step 7: Domain entities and behavior patterns
        info!("📦 Detecting domain entities...");
        let domain_entities = self.entity_detector.detect_entities(&build.table, &full_graph);
        let patterns = self.pattern_detector.detect_patterns(&build.table);
        info!("Found {} domain entities and {} patterns", domain_entities.len(), patterns.len());

        let skipped_files = normalize_skipped(
            skipped
                .into_iter()
                .chain(build.skipped)
                .chain(resolution.partial_files)
                .collect(),
        );
        let diagnostics = Diagnostics {
            duplicate_symbols: build.duplicates,
            ambiguous_calls: resolution.ambiguous,
            dangling_calls: resolution.dangling,
        };
        if !diagnostics.is_empty() {
            debug!(
                "Diagnostics: {} duplicate symbols, {} ambiguous calls, {} dangling calls",
                diagnostics.duplicate_symbols.len(),
                diagnostics.ambiguous_calls.len(),
                diagnostics.dangling_calls.len()
            );
        }

        let analyzed_paths: HashSet<&Path> = build.files.iter().map(|unit| unit.path.as_path()).collect();
        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        for unit in &build.files {
            *languages.entry(unit.language.clone()).or_default() += 1;
        }

        let summary = AnalysisSummary {
            files_analyzed: build.files.len(),
            files_skipped: count_dropped_files(&skipped_files, &analyzed_paths),
            partial_files: skipped_files.iter().filter(|s| s.reason == SkipReason::Partial).count(),
            languages,
            symbols: count_symbols(&build.table),
            full_graph: full_stats,
            filtered_graph: filtered_graph.statistics().clone(),
            entrypoint_count: entrypoints.len(),
            flow_count: flows.len(),
            domain_entity_count: domain_entities.len(),
            pattern_count: patterns.len(),
            max_call_depth: filtered_graph.longest_chain(),
            complexity_score: 0.0,
        };
        let summary = AnalysisSummary {
            complexity_score: complexity_score(&summary),
            ..summary
        };

        info!("✅ Analysis complete in {}ms", start_time.elapsed().as_millis());

        AnalysisResult {
            symbols: build.table,
            full_graph,
            filtered_graph,
            entrypoints,
            flows,
            domain_entities,
            skipped_files,
            patterns,
            diagnostics,
            summary,
        }
    }
}

fn count_symbols(table: &SymbolTable) -> SymbolCounts {
    let mut counts = SymbolCounts {
        total: table.len(),
        ..SymbolCounts::default()
    };
    for symbol in table.iter() {
        match symbol.kind {
            SymbolKind::Function => counts.functions += 1,
            SymbolKind::Method => counts.methods += 1,
            SymbolKind::Class => counts.classes += 1,
            SymbolKind::Module => counts.modules += 1,
        }
    }
    counts
}

/// Size factor (symbols plus resolved call sites, capped at 100) scaled by call depth
fn complexity_score(summary: &AnalysisSummary) -> f64 {
    let resolved_calls = summary.full_graph.total_calls - summary.full_graph.unresolved_calls;
    let size = ((summary.symbols.total as f64 + resolved_calls as f64) / 10.0).min(100.0);
    let depth = (summary.max_call_depth as f64 / 5.0).min(2.0);
    round_score((size * depth).min(100.0))
}

impl AnalysisResult {
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn full_graph(&self) -> &CallGraph {
        &self.full_graph
    }

    pub fn filtered_graph(&self) -> &CallGraph {
        &self.filtered_graph
    }

    pub fn entrypoints(&self) -> &[EntryPoint] {
        &self.entrypoints
    }

    pub fn flows(&self) -> &[ExecutionFlow] {
        &self.flows
    }

    pub fn domain_entities(&self) -> &[DomainEntity] {
        &self.domain_entities
    }

    pub fn skipped_files(&self) -> &[SkippedFile] {
        &self.skipped_files
    }

    pub fn patterns(&self) -> &[BehaviorPattern] {
        &self.patterns
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        Ok(if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// SHA-256 of the compact JSON form; equal inputs give equal fingerprints
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(&Config::default()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let mut config = Config::default();
        config.flows.max_depth = 0;
        assert!(AnalysisEngine::new(&config).is_err());
    }

    #[test]
    fn empty_input_gives_an_empty_result() {
        let result = engine().analyze(Vec::new());

        assert!(result.symbols().is_empty());
        assert!(result.full_graph().is_empty());
        assert!(result.entrypoints().is_empty());
        assert!(result.flows().is_empty());
        assert!(result.domain_entities().is_empty());
        assert_eq!(result.summary().complexity_score, 0.0);
    }

    #[test]
    fn summary_counts_files_symbols_and_depth() {
        let files = vec![
            SourceFile::new("app.py", "python")
                .with_symbol("main", "function", 1)
                .with_symbol("step", "function", 5)
                .with_call("main", "step", 2),
            SourceFile::new("web/index.js", "javascript").with_symbol("render", "function", 1),
        ];
        let skipped = vec![SkippedFile::new("broken.json", SkipReason::Malformed, "expected value")];

        let result = engine().run(files, skipped);
        let summary = result.summary();
        assert_eq!(summary.files_analyzed, 2);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.languages.get("python"), Some(&1));
        assert_eq!(summary.symbols.functions, 3);
        assert_eq!(summary.max_call_depth, 2);
        // (3 symbols + 1 resolved call) / 10 scaled by 2 / 5
        assert_eq!(summary.complexity_score, 0.16);
    }

    #[test]
    fn call_depth_is_measured_on_the_graph_not_the_flows() {
        let mut file = SourceFile::new("chain.py", "python");
        for i in 0..8u32 {
            file = file.with_symbol(&format!("f{}", i), "function", i + 1);
            if i > 0 {
                file = file.with_call(&format!("f{}", i - 1), &format!("f{}", i), i);
            }
        }
        file = file.with_call("f7", "f4", 8);

        let mut config = Config::default();
        config.flows.max_depth = 3;
        let result = AnalysisEngine::new(&config).unwrap().analyze(vec![file]);

        assert!(result.flows().iter().all(|f| f.steps.len() <= 3));
        assert_eq!(result.summary().max_call_depth, 8);
    }

    #[test]
    fn repeated_record_for_a_partial_file_is_not_counted_as_skipped() {
        let record = |name: &str| {
            SourceFile::new("lib.rs", "rust")
                .with_symbol("helper", "macro", 1)
                .with_symbol(name, "fn", 4)
        };

        let result = engine().analyze(vec![record("run"), record("other")]);
        let summary = result.summary();
        assert_eq!(summary.files_analyzed, 1);
        assert_eq!(summary.files_skipped, 0);
        assert_eq!(summary.partial_files, 1);

        let duplicate = result
            .skipped_files()
            .iter()
            .find(|s| s.reason == SkipReason::Duplicate)
            .unwrap();
        assert!(duplicate.detail.starts_with("record "));
    }

    #[test]
    fn fingerprint_is_stable_across_runs() {
        let files = || {
            vec![SourceFile::new("app.py", "python")
                .with_symbol("main", "function", 1)
                .with_call("main", "print", 2)]
        };
        let a = engine().analyze(files());
        let b = engine().analyze(files());
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
