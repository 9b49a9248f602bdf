// src/core/call_graph/flow_tracer.rs
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use super::{CallGraph, EntryPoint, SymbolId, SymbolTable};

/// Traces execution paths from entry points through the filtered call graph
pub struct FlowTracer {
    /// Maximum number of symbols in a flow
    max_depth: usize,
    /// Flows kept per entry point
    max_flows_per_entrypoint: usize,
}

/// Why a traced path stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowTermination {
    /// The last symbol calls nothing in the filtered graph
    Leaf,
    /// The path reached the depth bound
    DepthLimit,
    /// Every callee of the last symbol is already on the path
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFlow {
    pub name: String,
    /// Entry point that starts this flow
    pub entrypoint: SymbolId,
    /// Symbols in execution order, entry point first
    pub steps: Vec<SymbolId>,
    /// Sum of the edge weights along the path
    pub total_weight: u64,
    /// All files involved in this flow
    pub files: Vec<PathBuf>,
    pub termination: FlowTermination,
}

/// Per-graph lookups shared by every entry point of one trace
struct TraceIndex {
    /// Position of each node in qualified-name order
    name_rank: HashMap<SymbolId, usize>,
    /// Resolved callees inside the graph, heaviest first, then by name rank
    successors: HashMap<SymbolId, Vec<(SymbolId, u32)>>,
    /// Heaviest edge in the graph, bounds the weight a branch can still gain
    max_edge_weight: u64,
}

impl TraceIndex {
    fn new(graph: &CallGraph, table: &SymbolTable) -> Self {
        let mut by_name: Vec<SymbolId> = graph.nodes().to_vec();
        by_name.sort_by(|a, b| table.qualified_name(*a).cmp(table.qualified_name(*b)));
        let name_rank: HashMap<SymbolId, usize> = by_name
            .into_iter()
            .enumerate()
            .map(|(rank, id)| (id, rank))
            .collect();

        let mut successors: HashMap<SymbolId, Vec<(SymbolId, u32)>> = HashMap::new();
        let mut max_edge_weight = 0u64;
        for &node in graph.nodes() {
            let mut callees: Vec<(SymbolId, u32)> = graph
                .outgoing(node)
                .filter_map(|edge| edge.target().map(|target| (target, edge.weight)))
                .filter(|(target, _)| name_rank.contains_key(target))
                .collect();
            callees.sort_by(|(a, wa), (b, wb)| wb.cmp(wa).then_with(|| name_rank[a].cmp(&name_rank[b])));
            if let Some(&(_, heaviest)) = callees.first() {
                max_edge_weight = max_edge_weight.max(u64::from(heaviest));
            }
            successors.insert(node, callees);
        }

        Self {
            name_rank,
            successors,
            max_edge_weight,
        }
    }

    fn successors(&self, node: SymbolId) -> &[(SymbolId, u32)] {
        self.successors.get(&node).map_or(&[], Vec::as_slice)
    }

    fn rank(&self, id: SymbolId) -> usize {
        self.name_rank.get(&id).copied().unwrap_or(usize::MAX)
    }
}

struct Frame {
    path: Vec<SymbolId>,
    ranks: Vec<usize>,
    weight: u64,
}

/// A finished path; orders so that the better path is `Less`
struct TracedPath {
    steps: Vec<SymbolId>,
    ranks: Vec<usize>,
    weight: u64,
    termination: FlowTermination,
}

impl Ord for TracedPath {
    /// Longest first, then heaviest, then by step names
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .steps
            .len()
            .cmp(&self.steps.len())
            .then_with(|| other.weight.cmp(&self.weight))
            .then_with(|| self.ranks.cmp(&other.ranks))
    }
}

impl PartialOrd for TracedPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TracedPath {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TracedPath {}

impl FlowTracer {
    pub fn new(max_depth: usize, max_flows_per_entrypoint: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            max_flows_per_entrypoint: max_flows_per_entrypoint.max(1),
        }
    }

    /// Trace flows from all entry points, in entry point order
    pub fn trace_all(&self, graph: &CallGraph, table: &SymbolTable, entry_points: &[EntryPoint]) -> Vec<ExecutionFlow> {
        let index = TraceIndex::new(graph, table);
        entry_points
            .iter()
            .flat_map(|entry| self.trace_with(&index, graph, table, entry.symbol))
            .collect()
    }

    pub fn trace_from_entry_point(&self, graph: &CallGraph, table: &SymbolTable, entry: SymbolId) -> Vec<ExecutionFlow> {
        let index = TraceIndex::new(graph, table);
        self.trace_with(&index, graph, table, entry)
    }

    /// Depth-first walk with an explicit stack, keeping only the best paths seen so far.
    ///
    /// A branch is dropped once even its longest, heaviest extension would rank below the
    /// worst kept path, so dense graphs cost roughly the kept paths times the fan-out.
    fn trace_with(&self, index: &TraceIndex, graph: &CallGraph, table: &SymbolTable, entry: SymbolId) -> Vec<ExecutionFlow> {
        if !graph.contains(entry) {
            return Vec::new();
        }

        // Max-heap on the ordering above: the top is the worst kept path
        let mut kept: BinaryHeap<TracedPath> = BinaryHeap::with_capacity(self.max_flows_per_entrypoint + 1);
        let mut stack = vec![Frame {
            path: vec![entry],
            ranks: vec![index.rank(entry)],
            weight: 0,
        }];

        while let Some(frame) = stack.pop() {
            if kept.len() >= self.max_flows_per_entrypoint {
                if let Some(worst) = kept.peek() {
                    if self.cannot_beat(index, &frame, worst) {
                        continue;
                    }
                }
            }

            let Some(&current) = frame.path.last() else { continue };
            let successors = index.successors(current);
            let termination = if successors.is_empty() {
                Some(FlowTermination::Leaf)
            } else if frame.path.len() >= self.max_depth {
                Some(FlowTermination::DepthLimit)
            } else if successors.iter().all(|(next, _)| frame.path.contains(next)) {
                Some(FlowTermination::Cycle)
            } else {
                None
            };

            if let Some(termination) = termination {
                kept.push(TracedPath {
                    steps: frame.path,
                    ranks: frame.ranks,
                    weight: frame.weight,
                    termination,
                });
                if kept.len() > self.max_flows_per_entrypoint {
                    kept.pop();
                }
                continue;
            }

            // Reverse so the heaviest callee is explored first
            for &(next, weight) in successors.iter().rev() {
                if frame.path.contains(&next) {
                    continue;
                }
                let mut path = frame.path.clone();
                path.push(next);
                let mut ranks = frame.ranks.clone();
                ranks.push(index.rank(next));
                stack.push(Frame {
                    path,
                    ranks,
                    weight: frame.weight + u64::from(weight),
                });
            }
        }

        let entry_name = table.get(entry).map(|s| s.name.as_str()).unwrap_or("entry");
        kept.into_sorted_vec()
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let files: BTreeSet<PathBuf> = path
                    .steps
                    .iter()
                    .filter_map(|id| table.get(*id))
                    .map(|s| s.file.clone())
                    .collect();
                ExecutionFlow {
                    name: if i == 0 {
                        format!("{}_flow", entry_name)
                    } else {
                        format!("{}_flow_{}", entry_name, i + 1)
                    },
                    entrypoint: entry,
                    steps: path.steps,
                    total_weight: path.weight,
                    files: files.into_iter().collect(),
                    termination: path.termination,
                }
            })
            .collect()
    }

    /// True when no extension of `frame` can rank at or above `worst`
    fn cannot_beat(&self, index: &TraceIndex, frame: &Frame, worst: &TracedPath) -> bool {
        let remaining = self.max_depth.saturating_sub(frame.path.len());
        let best_len = frame.path.len() + remaining;
        match best_len.cmp(&worst.steps.len()) {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }

        let best_weight = frame.weight + remaining as u64 * index.max_edge_weight;
        match best_weight.cmp(&worst.weight) {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }

        // Same length and weight at best: decided by the first differing step name
        frame
            .ranks
            .iter()
            .zip(&worst.ranks)
            .find(|(a, b)| a != b)
            .is_some_and(|(a, b)| a > b)
    }
}

impl Default for FlowTracer {
    fn default() -> Self {
        Self::new(5, 3)
    }
}
