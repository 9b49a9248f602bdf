// src/core/call_graph/resolver.rs
//! Resolves textual call sites to symbols of the table.
//!
//! Lookup order: local scope, same module, imports (and exact qualified text), project-wide
//! short name, then builtin/external. Resolution only reads the symbol table and each file's
//! import list.

use std::collections::HashMap;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::records::{last_segment, CallRecord, Span};
use super::diagnostics::{AmbiguousCall, DanglingCall, SkipReason, SkippedFile};
use super::symbol_table::{is_module_caller, FileUnit, Symbol, SymbolId, SymbolKind, SymbolTable};

/// Confidence of a project-wide name match without import evidence
pub const UNIQUE_NAME_CONFIDENCE: f64 = 0.7;

/// Target of a call edge
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Callee {
    Symbol(SymbolId),
    /// Call text that matched no project symbol
    Unresolved(String),
}

impl Callee {
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            Callee::Symbol(id) => Some(*id),
            Callee::Unresolved(_) => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Callee::Unresolved(_))
    }
}

/// How a call site was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionKind {
    LocalScope,
    SameModule,
    Import,
    Qualified,
    UniqueName,
    Ambiguous,
    Builtin,
    External,
}

impl ResolutionKind {
    pub fn is_unresolved(self) -> bool {
        matches!(self, ResolutionKind::Builtin | ResolutionKind::External)
    }
}

/// One call site after resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCall {
    pub caller: SymbolId,
    pub callee: Callee,
    pub span: Span,
    pub confidence: f64,
    pub builtin: bool,
    pub resolution: ResolutionKind,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionOutput {
    pub calls: Vec<ResolvedCall>,
    pub ambiguous: Vec<AmbiguousCall>,
    pub dangling: Vec<DanglingCall>,
    pub partial_files: Vec<SkippedFile>,
}

enum Outcome {
    Exact(SymbolId, ResolutionKind),
    Unique(SymbolId),
    Ambiguous { chosen: SymbolId, candidates: Vec<SymbolId> },
    Unresolved(ResolutionKind),
}

pub struct ReferenceResolver<'a> {
    table: &'a SymbolTable,
    /// First module-level symbol declared by each file
    module_symbols: HashMap<PathBuf, SymbolId>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        let mut module_symbols = HashMap::new();
        for symbol in table.iter().filter(|s| s.kind == SymbolKind::Module) {
            module_symbols.entry(symbol.file.clone()).or_insert(symbol.id);
        }
        Self { table, module_symbols }
    }

    /// Resolve every call of every file, in file order then record order
    pub fn resolve_all(&self, files: &[FileUnit]) -> ResolutionOutput {
        let mut output = ResolutionOutput::default();

        for unit in files {
            for call in &unit.calls {
                self.resolve_call(unit, call, &mut output);
            }
        }

        debug!(
            "Resolved {} call sites ({} ambiguous, {} dangling)",
            output.calls.len(),
            output.ambiguous.len(),
            output.dangling.len()
        );

        output
    }

    fn resolve_call(&self, unit: &FileUnit, call: &CallRecord, output: &mut ResolutionOutput) {
        let callee_text = call.callee.trim();
        let caller_id = match self.resolve_caller(unit, &call.caller) {
            Some(id) if !callee_text.is_empty() => id,
            _ => {
                output.dangling.push(DanglingCall {
                    file: unit.path.clone(),
                    caller_text: call.caller.clone(),
                    callee_text: call.callee.clone(),
                    span: call.span,
                });
                output.partial_files.push(SkippedFile::new(
                    unit.path.clone(),
                    SkipReason::Partial,
                    format!("call '{}' from unknown caller '{}'", call.callee, call.caller),
                ));
                return;
            }
        };
        let Some(caller) = self.table.get(caller_id) else { return };

        let (callee, confidence, resolution) = match self.resolve_callee(unit, caller, callee_text) {
            Outcome::Exact(id, kind) => (Callee::Symbol(id), 1.0, kind),
            Outcome::Unique(id) => (Callee::Symbol(id), UNIQUE_NAME_CONFIDENCE, ResolutionKind::UniqueName),
            Outcome::Ambiguous { chosen, candidates } => {
                let confidence = 1.0 / candidates.len() as f64;
                output.ambiguous.push(AmbiguousCall {
                    caller: caller_id,
                    callee_text: callee_text.to_string(),
                    span: call.span,
                    candidates,
                    chosen,
                    confidence,
                });
                (Callee::Symbol(chosen), confidence, ResolutionKind::Ambiguous)
            }
            Outcome::Unresolved(kind) => (Callee::Unresolved(callee_text.to_string()), 0.0, kind),
        };

        output.calls.push(ResolvedCall {
            caller: caller_id,
            builtin: callee.is_unresolved(),
            callee,
            span: call.span,
            confidence,
            resolution,
            file: unit.path.clone(),
        });
    }

    fn resolve_caller(&self, unit: &FileUnit, caller_text: &str) -> Option<SymbolId> {
        let module_symbol = self.module_symbols.get(&unit.path).copied();
        if is_module_caller(caller_text) {
            return module_symbol;
        }

        let local = caller_text.trim().replace("::", ".");
        if let Some(id) = self.table.lookup(&qualify(&unit.module, &local)) {
            return Some(id);
        }

        let same_file: Vec<SymbolId> = self
            .table
            .by_short_name(last_segment(&local))
            .iter()
            .copied()
            .filter(|id| self.table.get(*id).map_or(false, |s| s.file == unit.path))
            .collect();
        if same_file.len() == 1 {
            return Some(same_file[0]);
        }

        module_symbol
    }

    fn is_class(&self, module: &str, local: &str) -> bool {
        self.table
            .lookup(&qualify(module, local))
            .and_then(|id| self.table.get(id))
            .map_or(false, |symbol| symbol.kind == SymbolKind::Class)
    }

    fn resolve_callee(&self, unit: &FileUnit, caller: &Symbol, text: &str) -> Outcome {
        let (self_receiver, stripped) = strip_receiver(text);
        let name = stripped.replace("::", ".");

        // Local scope: nested in the caller, then each enclosing scope
        if caller.kind != SymbolKind::Module {
            let own_scope = caller.local_path();
            let bare_skips_classes = !self_receiver && !class_body_encloses_methods(&unit.language);
            let mut scope = Some(own_scope.clone());
            while let Some(current) = scope {
                let hidden = bare_skips_classes && current != own_scope && self.is_class(&unit.module, &current);
                if !hidden {
                    let candidate = qualify(&unit.module, &format!("{}.{}", current, name));
                    if let Some(id) = self.table.lookup(&candidate) {
                        return Outcome::Exact(id, ResolutionKind::LocalScope);
                    }
                }
                scope = current.rsplit_once('.').map(|(parent, _)| parent.to_string());
            }
        }

        if !self_receiver {
            if let Some(id) = self.table.lookup(&qualify(&unit.module, &name)) {
                return Outcome::Exact(id, ResolutionKind::SameModule);
            }
        }

        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name.as_str(), None),
        };
        let mut bound_outside_project = false;
        for import in &unit.imports {
            let target = import.target.replace("::", ".");
            if import.is_wildcard() {
                if let Some(id) = self.table.lookup(&format!("{}.{}", target, name)) {
                    return Outcome::Exact(id, ResolutionKind::Import);
                }
                continue;
            }
            if import.binding() != head || self_receiver {
                continue;
            }
            let candidate = match rest {
                Some(rest) => format!("{}.{}", target, rest),
                None => target.clone(),
            };
            if let Some(id) = self.table.lookup(&candidate) {
                return Outcome::Exact(id, ResolutionKind::Import);
            }
            if !self.table.contains_path(&target) {
                bound_outside_project = true;
            }
        }

        if let Some(id) = self.table.lookup(&name) {
            return Outcome::Exact(id, ResolutionKind::Qualified);
        }

        if bound_outside_project {
            return Outcome::Unresolved(ResolutionKind::External);
        }

        let short = last_segment(&name);
        // A bare name cannot reach a method when the language requires a receiver
        let methods_reachable = self_receiver || name.contains('.') || class_body_encloses_methods(&unit.language);
        let candidates: Vec<SymbolId> = self
            .table
            .by_short_name(short)
            .iter()
            .copied()
            .filter(|id| {
                methods_reachable || self.table.get(*id).map_or(true, |s| s.kind != SymbolKind::Method)
            })
            .collect();
        match candidates.as_slice() {
            [] => {
                if is_builtin(&unit.language, &name) {
                    Outcome::Unresolved(ResolutionKind::Builtin)
                } else {
                    Outcome::Unresolved(ResolutionKind::External)
                }
            }
            [only] => Outcome::Unique(*only),
            many => Outcome::Ambiguous {
                chosen: self.rank_candidates(caller, &name, many),
                candidates: many.to_vec(),
            },
        }
    }

    /// Pick the most plausible of several same-named symbols
    fn rank_candidates(&self, caller: &Symbol, name: &str, candidates: &[SymbolId]) -> SymbolId {
        let qualifier = name
            .rsplit_once('.')
            .map(|(q, _)| last_segment(q).to_ascii_lowercase());

        let score = |symbol: &Symbol| -> usize {
            let mut score = 0;
            if let Some(qualifier) = &qualifier {
                let scope_hit = symbol
                    .scope
                    .as_deref()
                    .map_or(false, |s| last_segment(s).eq_ignore_ascii_case(qualifier));
                let module_hit = last_segment(&symbol.module).eq_ignore_ascii_case(qualifier);
                if scope_hit || module_hit {
                    score += 2;
                }
            }
            score += caller
                .module
                .split('.')
                .zip(symbol.module.split('.'))
                .take_while(|(a, b)| a == b)
                .count();
            if symbol.language == caller.language {
                score += 1;
            }
            score
        };

        candidates
            .iter()
            .filter_map(|id| self.table.get(*id))
            .max_by(|a, b| {
                score(a)
                    .cmp(&score(b))
                    .then_with(|| b.qualified_name.cmp(&a.qualified_name))
            })
            .map(|s| s.id)
            .unwrap_or(candidates[0])
    }
}

fn qualify(module: &str, local: &str) -> String {
    if module.is_empty() {
        local.to_string()
    } else {
        format!("{}.{}", module, local)
    }
}

/// Split off a `self.` / `this.` / `cls.` receiver
fn strip_receiver(text: &str) -> (bool, &str) {
    for receiver in ["self.", "this.", "cls.", "Self::"] {
        if let Some(rest) = text.strip_prefix(receiver) {
            if !rest.is_empty() {
                return (true, rest);
            }
        }
    }
    (false, text)
}

const PYTHON_BUILTINS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "bool", "list", "dict", "set", "tuple",
    "open", "isinstance", "issubclass", "super", "enumerate", "zip", "map", "filter", "sorted",
    "sum", "min", "max", "any", "all", "getattr", "setattr", "hasattr", "type", "repr", "abs",
    "round", "format", "iter", "next", "input", "id", "hash", "vars", "dir", "reversed",
];

const JS_BUILTINS: &[&str] = &[
    "console", "JSON", "Math", "Object", "Array", "Promise", "Number", "String", "Date",
    "parseInt", "parseFloat", "setTimeout", "setInterval", "clearTimeout", "require",
    "isNaN", "Symbol", "Error", "Map", "Set",
];

const RUST_BUILTINS: &[&str] = &[
    "println", "print", "eprintln", "format", "vec", "panic", "assert", "assert_eq", "Some",
    "Ok", "Err", "Box", "String", "Vec", "Default", "write", "writeln",
];

const JAVA_BUILTINS: &[&str] = &[
    "System", "println", "print", "equals", "hashCode", "toString", "length", "size",
    "String", "Integer", "Objects", "Arrays", "Collections", "List", "Map",
];

/// Whether a bare name inside a method can reach members of the enclosing class.
///
/// Python, JavaScript and Rust need an explicit receiver (`self.`, `this.`, `Self::`).
fn class_body_encloses_methods(language: &str) -> bool {
    !matches!(
        language.to_ascii_lowercase().as_str(),
        "python" | "javascript" | "typescript" | "js" | "ts" | "rust"
    )
}

/// Whether a call names a language builtin rather than an unknown external
fn is_builtin(language: &str, name: &str) -> bool {
    let head = name.split('.').next().unwrap_or(name);
    let lists: &[&[&str]] = match language.to_ascii_lowercase().as_str() {
        "python" => &[PYTHON_BUILTINS],
        "javascript" | "typescript" | "js" | "ts" => &[JS_BUILTINS],
        "rust" => &[RUST_BUILTINS],
        "java" | "kotlin" => &[JAVA_BUILTINS],
        _ => &[PYTHON_BUILTINS, JS_BUILTINS, RUST_BUILTINS, JAVA_BUILTINS],
    };
    lists.iter().any(|list| list.contains(&head) || list.contains(&name))
}
