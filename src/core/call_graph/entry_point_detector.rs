// src/core/call_graph/entry_point_detector.rs
use std::cmp::Ordering;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EntrypointConfig, EntrypointWeights};
use crate::error::{DigestError, Result};
use super::scoring::{exceeds, FeatureContribution, FeatureTable};
use super::{CallGraph, Symbol, SymbolId, SymbolKind, SymbolTable};

/// Scores symbols of the filtered graph as probable execution starts
pub struct EntryPointDetector {
    threshold: f64,
    top_k: Option<usize>,
    weights: EntrypointWeights,
    /// Known entry point patterns by name
    main_patterns: Vec<Regex>,
    /// Decorators marking externally registered handlers
    handler_patterns: Vec<Regex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryFeature {
    NamingPattern,
    NoIncomingEdges,
    ModuleLevel,
    RegisteredHandler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryPointType {
    /// Main application entry point
    Main,
    /// Command / route / task handler
    Handler,
    /// Code run when a module is loaded
    ModuleInit,
    /// Nothing in the codebase calls it
    Uncalled,
    /// Chosen only because it scored highest
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub symbol: SymbolId,
    pub qualified_name: String,
    pub score: f64,
    pub entry_type: EntryPointType,
    pub features: Vec<FeatureContribution<EntryFeature>>,
    /// Selected because no candidate cleared the threshold
    #[serde(default)]
    pub fallback: bool,
}

impl EntryPointDetector {
    pub fn new(config: &EntrypointConfig) -> Result<Self> {
        Ok(Self {
            threshold: config.threshold,
            top_k: config.top_k,
            weights: config.weights.clone(),
            main_patterns: compile(&config.main_patterns)?,
            handler_patterns: compile(&config.handler_decorators)?,
        })
    }

    /// Score one symbol against the feature table
    pub fn score(&self, symbol: &Symbol, graph: &CallGraph) -> EntryPoint {
        let weights = &self.weights;
        let naming = self.main_patterns.iter().any(|p| p.is_match(&symbol.name));
        let uncalled = graph.contains(symbol.id) && graph.in_degree_excluding_self(symbol.id) == 0;
        let module_level = symbol.kind == SymbolKind::Module;
        let handler = symbol.registered
            || symbol
                .decorators
                .iter()
                .any(|d| self.handler_patterns.iter().any(|p| p.is_match(d.trim_start_matches('@'))));

        let mut table = FeatureTable::new();
        table
            .flag(EntryFeature::NamingPattern, weights.naming_pattern, naming)
            .flag(EntryFeature::NoIncomingEdges, weights.no_incoming_edges, uncalled)
            .flag(EntryFeature::ModuleLevel, weights.module_level, module_level)
            .flag(EntryFeature::RegisteredHandler, weights.registered_handler, handler);

        let entry_type = if naming {
            EntryPointType::Main
        } else if handler {
            EntryPointType::Handler
        } else if module_level {
            EntryPointType::ModuleInit
        } else if uncalled {
            EntryPointType::Uncalled
        } else {
            EntryPointType::Inferred
        };

        EntryPoint {
            symbol: symbol.id,
            qualified_name: symbol.qualified_name.clone(),
            score: table.score(),
            entry_type,
            features: table.into_rows(),
            fallback: false,
        }
    }

    /// Detect all entry points in the (filtered) call graph
    pub fn detect_entry_points(&self, graph: &CallGraph, table: &SymbolTable) -> Vec<EntryPoint> {
        let mut scored: Vec<EntryPoint> = graph
            .nodes()
            .iter()
            .filter_map(|&id| table.get(id))
            .map(|symbol| self.score(symbol, graph))
            .collect();

        // Sort by score, then name for a stable order
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.qualified_name.cmp(&b.qualified_name))
        });

        let mut selected: Vec<EntryPoint> = scored
            .iter()
            .filter(|candidate| exceeds(candidate.score, self.threshold))
            .cloned()
            .collect();
        if let Some(limit) = self.top_k {
            selected.truncate(limit);
        }

        if selected.is_empty() {
            if let Some(best) = scored.into_iter().next() {
                debug!(
                    "No entrypoint above {:.2}; falling back to {} ({:.2})",
                    self.threshold, best.qualified_name, best.score
                );
                selected.push(EntryPoint {
                    fallback: true,
                    ..best
                });
            }
        }

        for ep in &selected {
            debug!("Entry point: {} (type: {:?}, score: {:.2})", ep.qualified_name, ep.entry_type, ep.score);
        }

        selected
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| DigestError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
