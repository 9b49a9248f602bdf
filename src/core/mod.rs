// src/core/mod.rs
mod engine;
mod loader;

// Semantic graph and analysis engine
pub mod call_graph;

// Front-end record contract
pub mod records;

pub use engine::{AnalyzeOptions, ConfigOverrides, Engine, ExportEnvelope, ExportMetadata, CONFIG_FILE_NAME};
pub use loader::{LoadedRecords, RecordLoader};

pub use call_graph::{AnalysisEngine, AnalysisResult, AnalysisSummary};
pub use records::{CallRecord, ImportRecord, SourceFile, Span, SymbolRecord};
