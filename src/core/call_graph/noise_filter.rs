// src/core/call_graph/noise_filter.rs
use std::collections::BTreeSet;
use tracing::debug;

use super::call_graph::{CallEdge, CallGraph};
use super::symbol_table::{SymbolId, SymbolKind, SymbolTable};

/// Derives the analysis view of a call graph without touching the original
pub struct NoiseFilter {
    enabled: bool,
}

impl NoiseFilter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Drop unresolved edges, then nodes left without any edge.
    ///
    /// Module-level code always survives since it runs on load and may start a flow.
    pub fn apply(&self, full: &CallGraph, table: &SymbolTable) -> CallGraph {
        if !self.enabled {
            return full.clone();
        }

        let edges: Vec<CallEdge> = full
            .edges()
            .iter()
            .filter(|edge| !edge.callee.is_unresolved())
            .cloned()
            .collect();

        let touched: BTreeSet<SymbolId> = edges
            .iter()
            .flat_map(|edge| [Some(edge.caller), edge.target()])
            .flatten()
            .collect();

        let nodes: Vec<SymbolId> = full
            .nodes()
            .iter()
            .copied()
            .filter(|node| {
                touched.contains(node)
                    || table.get(*node).map_or(false, |s| s.kind == SymbolKind::Module)
            })
            .collect();

        debug!(
            "Noise filter kept {}/{} nodes and {}/{} edges",
            nodes.len(),
            full.nodes().len(),
            edges.len(),
            full.edges().len()
        );

        CallGraph::from_parts(nodes, edges)
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(true)
    }
}
