// src/core/call_graph/mod.rs
//! Semantic graph and analysis engine
//!
//! Front-end records are merged into a symbol table, call sites are resolved into a
//! weighted call graph, and the graph is analyzed for entry points, execution flows,
//! domain entities and behavior patterns.

mod analysis_engine;
mod call_graph;
mod diagnostics;
mod domain_entity_detector;
mod entry_point_detector;
mod flow_tracer;
mod noise_filter;
mod pattern_detector;
mod resolver;
mod scoring;
mod symbol_table;

pub use analysis_engine::{AnalysisEngine, AnalysisResult, AnalysisSummary, SymbolCounts};
pub use call_graph::{CallEdge, CallGraph, CallGraphBuilder, CallGraphStats, CallSite};
pub use diagnostics::{AmbiguousCall, DanglingCall, Diagnostics, DuplicateSymbol, SkipReason, SkippedFile};
pub use domain_entity_detector::{DomainEntity, DomainEntityDetector, EntityFeature, OTHER_CATEGORY};
pub use entry_point_detector::{EntryFeature, EntryPoint, EntryPointDetector, EntryPointType};
pub use flow_tracer::{ExecutionFlow, FlowTermination, FlowTracer};
pub use noise_filter::NoiseFilter;
pub use pattern_detector::{BehaviorPattern, PatternDetector, PatternKind};
pub use resolver::{Callee, ReferenceResolver, ResolutionKind, ResolutionOutput, ResolvedCall};
pub use scoring::{FeatureContribution, FeatureTable};
pub use symbol_table::{
    module_path, FileUnit, Symbol, SymbolId, SymbolKind, SymbolTable, SymbolTableBuild, SymbolTableBuilder,
    MODULE_SYMBOL,
};
