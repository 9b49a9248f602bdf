// src/core/call_graph/call_graph.rs
use std::collections::BTreeMap;
use std::path::PathBuf;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::core::records::Span;
use super::resolver::{Callee, ResolutionKind, ResolvedCall};
use super::symbol_table::{SymbolId, SymbolTable};

/// Location of one observed call
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSite {
    pub file: PathBuf,
    pub span: Span,
}

/// Deduplicated (caller, callee) edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEdge {
    /// Method making the call
    pub caller: SymbolId,
    /// Symbol being called, or the unresolved call text
    pub callee: Callee,
    /// Number of call sites folded into this edge
    pub weight: u32,
    /// Highest confidence among the folded call sites
    pub confidence: f64,
    pub builtin: bool,
    pub resolution: ResolutionKind,
    pub call_sites: Vec<CallSite>,
}

impl CallEdge {
    pub fn target(&self) -> Option<SymbolId> {
        self.callee.symbol()
    }

    pub fn is_self_call(&self) -> bool {
        self.target() == Some(self.caller)
    }
}

/// Summary numbers consumed by the reporting layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub total_calls: u64,
    pub resolved_edges: usize,
    pub unresolved_edges: usize,
    pub unresolved_calls: u64,
    pub component_count: usize,
    pub largest_component: usize,
    pub isolated_nodes: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    pub cycles: usize,
}

/// Directed, weighted call graph over an arena of symbol ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CallGraphData", into = "CallGraphData")]
pub struct CallGraph {
    nodes: Vec<SymbolId>,
    edges: Vec<CallEdge>,
    /// Edge indices by caller
    outgoing: BTreeMap<SymbolId, Vec<usize>>,
    /// Edge indices by resolved callee
    incoming: BTreeMap<SymbolId, Vec<usize>>,
    statistics: CallGraphStats,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallGraphData {
    nodes: Vec<SymbolId>,
    edges: Vec<CallEdge>,
    #[serde(default)]
    statistics: CallGraphStats,
}

impl From<CallGraphData> for CallGraph {
    fn from(data: CallGraphData) -> Self {
        CallGraph::from_parts(data.nodes, data.edges)
    }
}

impl From<CallGraph> for CallGraphData {
    fn from(graph: CallGraph) -> Self {
        CallGraphData {
            nodes: graph.nodes,
            edges: graph.edges,
            statistics: graph.statistics,
        }
    }
}

impl CallGraph {
    /// Assemble a graph; nodes and edges are put into canonical order
    pub fn from_parts(mut nodes: Vec<SymbolId>, mut edges: Vec<CallEdge>) -> Self {
        nodes.sort();
        nodes.dedup();
        edges.sort_by(|a, b| (a.caller, &a.callee).cmp(&(b.caller, &b.callee)));

        let mut graph = Self {
            nodes,
            edges,
            ..Self::default()
        };
        graph.build_adjacency_lists();
        graph.statistics = graph.compute_statistics();
        graph
    }

    pub fn nodes(&self) -> &[SymbolId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    pub fn statistics(&self) -> &CallGraphStats {
        &self.statistics
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.nodes.binary_search(&id).is_ok()
    }

    /// Edges leaving `id`, resolved and unresolved
    pub fn outgoing(&self, id: SymbolId) -> impl Iterator<Item = &CallEdge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .map(move |&index| &self.edges[index])
    }

    /// Edges arriving at `id`
    pub fn incoming(&self, id: SymbolId) -> impl Iterator<Item = &CallEdge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .map(move |&index| &self.edges[index])
    }

    /// Get in-degree (number of distinct callers)
    pub fn in_degree(&self, id: SymbolId) -> usize {
        self.incoming.get(&id).map_or(0, Vec::len)
    }

    /// Callers other than `id` itself
    pub fn in_degree_excluding_self(&self, id: SymbolId) -> usize {
        self.incoming(id).filter(|edge| !edge.is_self_call()).count()
    }

    /// Get out-degree (number of distinct callees)
    pub fn out_degree(&self, id: SymbolId) -> usize {
        self.outgoing.get(&id).map_or(0, Vec::len)
    }

    /// Resolved edges between nodes of this graph, as a petgraph digraph
    fn to_digraph(&self) -> DiGraph<SymbolId, ()> {
        let mut graph: DiGraph<SymbolId, ()> = DiGraph::new();
        let mut index: BTreeMap<SymbolId, NodeIndex> = BTreeMap::new();
        for &node in &self.nodes {
            index.insert(node, graph.add_node(node));
        }
        for edge in &self.edges {
            if let (Some(from), Some(to)) = (
                index.get(&edge.caller),
                edge.target().and_then(|t| index.get(&t)),
            ) {
                graph.add_edge(*from, *to, ());
            }
        }
        graph
    }

    /// Strongly connected groups of mutually calling symbols, including self-recursion
    pub fn cycles(&self) -> Vec<Vec<SymbolId>> {
        let graph = self.to_digraph();
        let mut cycles: Vec<Vec<SymbolId>> = tarjan_scc(&graph)
            .into_iter()
            .map(|component| {
                let mut members: Vec<SymbolId> = component.iter().map(|n| graph[*n]).collect();
                members.sort();
                members
            })
            .filter(|members| {
                members.len() > 1
                    || self.outgoing(members[0]).any(|edge| edge.is_self_call())
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Symbols on the longest call chain, counting each mutually recursive group once per member.
    ///
    /// Runs over the condensation so cycles cannot make it diverge.
    pub fn longest_chain(&self) -> usize {
        let graph = self.to_digraph();
        // tarjan_scc yields components callees first
        let components = tarjan_scc(&graph);
        let mut component_of = vec![0usize; graph.node_count()];
        for (position, component) in components.iter().enumerate() {
            for node in component {
                component_of[node.index()] = position;
            }
        }

        let mut depth = vec![0usize; components.len()];
        for (position, component) in components.iter().enumerate() {
            let below = component
                .iter()
                .flat_map(|node| graph.neighbors(*node))
                .map(|next| component_of[next.index()])
                .filter(|&target| target != position)
                .map(|target| depth[target])
                .max()
                .unwrap_or(0);
            depth[position] = component.len() + below;
        }
        depth.into_iter().max().unwrap_or(0)
    }

    /// Weakly connected components over resolved edges, each sorted by id
    pub fn components(&self) -> Vec<Vec<SymbolId>> {
        let mut sets = UnionFind::new(self.nodes.len());
        for edge in &self.edges {
            let Some(target) = edge.target() else { continue };
            if let (Ok(a), Ok(b)) = (self.nodes.binary_search(&edge.caller), self.nodes.binary_search(&target)) {
                sets.union(a, b);
            }
        }

        let mut grouped: BTreeMap<usize, Vec<SymbolId>> = BTreeMap::new();
        for (position, node) in self.nodes.iter().enumerate() {
            grouped.entry(sets.find(position)).or_default().push(*node);
        }
        let mut components: Vec<Vec<SymbolId>> = grouped.into_values().collect();
        components.sort();
        components
    }

    fn build_adjacency_lists(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();

        for (index, edge) in self.edges.iter().enumerate() {
            self.outgoing.entry(edge.caller).or_default().push(index);
            if let Some(target) = edge.target() {
                self.incoming.entry(target).or_default().push(index);
            }
        }
    }

    fn compute_statistics(&self) -> CallGraphStats {
        let components = self.components();
        let unresolved: Vec<&CallEdge> = self.edges.iter().filter(|e| e.callee.is_unresolved()).collect();

        CallGraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            total_calls: self.edges.iter().map(|e| u64::from(e.weight)).sum(),
            resolved_edges: self.edges.len() - unresolved.len(),
            unresolved_edges: unresolved.len(),
            unresolved_calls: unresolved.iter().map(|e| u64::from(e.weight)).sum(),
            component_count: components.len(),
            largest_component: components.iter().map(Vec::len).max().unwrap_or(0),
            isolated_nodes: self
                .nodes
                .iter()
                .filter(|&&n| {
                    self.in_degree(n) == 0 && self.outgoing(n).all(|e| e.callee.is_unresolved())
                })
                .count(),
            max_in_degree: self.nodes.iter().map(|&n| self.in_degree(n)).max().unwrap_or(0),
            max_out_degree: self.nodes.iter().map(|&n| self.out_degree(n)).max().unwrap_or(0),
            cycles: self.cycles().len(),
        }
    }
}

/// Folds resolved call sites into the full call graph
#[derive(Debug, Default)]
pub struct CallGraphBuilder;

impl CallGraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// One node per symbol, one edge per distinct (caller, callee) pair
    pub fn build(&self, table: &SymbolTable, calls: &[ResolvedCall]) -> CallGraph {
        let nodes: Vec<SymbolId> = table.iter().map(|symbol| symbol.id).collect();
        let mut folded: BTreeMap<(SymbolId, Callee), CallEdge> = BTreeMap::new();

        for call in calls {
            let site = CallSite {
                file: call.file.clone(),
                span: call.span,
            };
            let edge = folded
                .entry((call.caller, call.callee.clone()))
                .or_insert_with(|| CallEdge {
                    caller: call.caller,
                    callee: call.callee.clone(),
                    weight: 0,
                    confidence: call.confidence,
                    builtin: call.builtin,
                    resolution: call.resolution,
                    call_sites: Vec::new(),
                });

            edge.weight += 1;
            if call.confidence > edge.confidence {
                edge.confidence = call.confidence;
                edge.resolution = call.resolution;
            }
            edge.call_sites.push(site);
        }

        let edges: Vec<CallEdge> = folded
            .into_values()
            .map(|mut edge| {
                edge.call_sites.sort();
                edge
            })
            .collect();

        CallGraph::from_parts(nodes, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::resolver::ReferenceResolver;
    use crate::core::call_graph::symbol_table::SymbolTableBuilder;
    use crate::core::records::SourceFile;

    fn graph_of(files: Vec<SourceFile>) -> (SymbolTable, CallGraph) {
        let build = SymbolTableBuilder::new().build(files);
        let resolved = ReferenceResolver::new(&build.table).resolve_all(&build.files);
        let graph = CallGraphBuilder::new().build(&build.table, &resolved.calls);
        (build.table, graph)
    }

    fn id(table: &SymbolTable, name: &str) -> SymbolId {
        table.lookup(name).unwrap()
    }

    #[test]
    fn repeated_calls_fold_into_weighted_edges() {
        let file = SourceFile::new("m.py", "python")
            .with_symbol("a", "function", 1)
            .with_symbol("b", "function", 5)
            .with_symbol("idle", "function", 9)
            .with_call("a", "b", 2)
            .with_call("a", "b", 3)
            .with_call("a", "print", 4);

        let (table, graph) = graph_of(vec![file]);
        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.edges().len(), 2);

        let edge = graph.outgoing(id(&table, "m.a")).next().unwrap();
        assert_eq!(edge.callee, Callee::Symbol(id(&table, "m.b")));
        assert_eq!(edge.weight, 2);
        assert_eq!(edge.call_sites.len(), 2);

        let stats = graph.statistics();
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.unresolved_edges, 1);
        assert_eq!(stats.unresolved_calls, 1);
        assert_eq!(stats.component_count, 2);
        assert_eq!(stats.largest_component, 2);
        assert_eq!(stats.isolated_nodes, 1);
    }

    #[test]
    fn cycles_are_detected_including_self_recursion() {
        let file = SourceFile::new("m.py", "python")
            .with_symbol("a", "function", 1)
            .with_symbol("b", "function", 2)
            .with_symbol("c", "function", 3)
            .with_symbol("fact", "function", 4)
            .with_call("a", "b", 1)
            .with_call("b", "c", 2)
            .with_call("c", "a", 3)
            .with_call("fact", "fact", 4);

        let (table, graph) = graph_of(vec![file]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].len(), 3);
        assert_eq!(cycles[1], vec![id(&table, "m.fact")]);
        assert_eq!(graph.statistics().cycles, 2);
        assert_eq!(graph.in_degree_excluding_self(id(&table, "m.fact")), 0);
    }

    #[test]
    fn longest_chain_counts_through_cycles_without_looping() {
        let file = SourceFile::new("m.py", "python")
            .with_symbol("main", "function", 1)
            .with_symbol("a", "function", 2)
            .with_symbol("b", "function", 3)
            .with_symbol("c", "function", 4)
            .with_symbol("done", "function", 5)
            .with_symbol("side", "function", 6)
            .with_call("main", "a", 1)
            .with_call("main", "side", 1)
            .with_call("a", "b", 2)
            .with_call("b", "c", 3)
            .with_call("c", "a", 4)
            .with_call("c", "done", 4);

        let (_, graph) = graph_of(vec![file]);
        assert_eq!(graph.longest_chain(), 5);
        assert_eq!(CallGraph::default().longest_chain(), 0);
    }

    #[test]
    fn serde_round_trip_rebuilds_adjacency() {
        let file = SourceFile::new("m.py", "python")
            .with_symbol("a", "function", 1)
            .with_symbol("b", "function", 2)
            .with_call("a", "b", 1);

        let (table, graph) = graph_of(vec![file]);
        let json = serde_json::to_string(&graph).unwrap();
        let restored: CallGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, graph);
        assert_eq!(restored.in_degree(id(&table, "m.b")), 1);
    }
}
