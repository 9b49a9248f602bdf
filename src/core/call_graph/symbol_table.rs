// src/core/call_graph/symbol_table.rs
//! Global symbol table built from per-file front-end records.
//!
//! Files are put into canonical order (path, then content fingerprint) and symbols into
//! source order before ids are assigned, so ids never depend on the order in which the
//! records were extracted.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::records::{CallRecord, ImportRecord, SourceFile, Span, SymbolRecord};
use super::diagnostics::{DuplicateSymbol, SkipReason, SkippedFile};

/// Local name used for module-level (load-time) code
pub const MODULE_SYMBOL: &str = "<module>";

/// Arena index of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    /// Code executed when the module is loaded
    Module,
}

impl SymbolKind {
    /// Map a front-end kind tag onto the engine's kinds
    pub fn from_record(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "function" | "fn" | "def" | "func" | "lambda" | "arrow_function" | "procedure" => {
                Some(SymbolKind::Function)
            }
            "method" | "constructor" | "ctor" | "getter" | "setter" | "staticmethod" | "classmethod" => {
                Some(SymbolKind::Method)
            }
            "class" | "struct" | "interface" | "type" | "enum" | "record" | "dataclass" | "trait"
            | "model" => Some(SymbolKind::Class),
            "module" | "module-level" | "module_level" | "script" | "toplevel" | "top-level" => {
                Some(SymbolKind::Module)
            }
            _ => None,
        }
    }

    pub fn is_callable(self) -> bool {
        !matches!(self, SymbolKind::Module)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub id: SymbolId,
    /// Short (last segment) name
    pub name: String,
    /// Module path + local path; unique within a run
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub file: PathBuf,
    pub language: String,
    pub span: Span,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    /// Declared attributes (classes only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Names of methods declared in this class's scope
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default)]
    pub registered: bool,
}

impl Symbol {
    /// Path of the symbol inside its module (`User.save`)
    pub fn local_path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}.{}", scope, self.name),
            None => self.name.clone(),
        }
    }
}

/// Arena of symbols indexed by [`SymbolId`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Symbol>", into = "Vec<Symbol>")]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_qualified: BTreeMap<String, SymbolId>,
    by_name: BTreeMap<String, Vec<SymbolId>>,
}

impl From<Vec<Symbol>> for SymbolTable {
    fn from(symbols: Vec<Symbol>) -> Self {
        let mut table = SymbolTable::default();
        for symbol in symbols {
            table.index(&symbol);
            table.symbols.push(symbol);
        }
        table
    }
}

impl From<SymbolTable> for Vec<Symbol> {
    fn from(table: SymbolTable) -> Self {
        table.symbols
    }
}

impl SymbolTable {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<SymbolId> {
        self.by_qualified.get(qualified_name).copied()
    }

    /// Callable symbols sharing a short name, in id order
    pub fn by_short_name(&self, name: &str) -> &[SymbolId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn qualified_name(&self, id: SymbolId) -> &str {
        self.get(id).map(|s| s.qualified_name.as_str()).unwrap_or("")
    }

    /// Whether `path` names a symbol or a module/scope containing symbols
    pub fn contains_path(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        if self.by_qualified.contains_key(path) {
            return true;
        }
        let prefix = format!("{}.", path);
        self.by_qualified
            .range(prefix.clone()..)
            .next()
            .map_or(false, |(name, _)| name.starts_with(&prefix))
    }

    fn index(&mut self, symbol: &Symbol) {
        self.by_qualified.insert(symbol.qualified_name.clone(), symbol.id);
        if symbol.kind.is_callable() {
            self.by_name.entry(symbol.name.clone()).or_default().push(symbol.id);
        }
    }

    fn push(&mut self, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        symbol.id = id;
        self.index(&symbol);
        self.symbols.push(symbol);
        id
    }
}

/// Per-file context kept after symbol extraction for reference resolution
#[derive(Debug, Clone)]
pub struct FileUnit {
    pub path: PathBuf,
    pub language: String,
    pub module: String,
    pub imports: Vec<ImportRecord>,
    pub calls: Vec<CallRecord>,
}

/// Output of [`SymbolTableBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct SymbolTableBuild {
    pub table: SymbolTable,
    pub files: Vec<FileUnit>,
    pub duplicates: Vec<DuplicateSymbol>,
    pub skipped: Vec<SkippedFile>,
}

/// Merges per-file symbol records into one deterministically ordered table
#[derive(Debug, Default)]
pub struct SymbolTableBuilder;

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, files: Vec<SourceFile>) -> SymbolTableBuild {
        let mut build = SymbolTableBuild::default();

        let mut keyed: Vec<(String, SourceFile)> = files
            .into_iter()
            .map(|file| (file.fingerprint(), file))
            .collect();
        keyed.sort_by(|(fa, a), (fb, b)| a.path.cmp(&b.path).then_with(|| fa.cmp(fb)));

        let mut seen_paths: HashSet<PathBuf> = HashSet::new();
        for (fingerprint, file) in keyed {
            if !seen_paths.insert(file.path.clone()) {
                debug!("Skipping duplicate record for {}", file.path.display());
                build.skipped.push(SkippedFile::new(
                    file.path.clone(),
                    SkipReason::Duplicate,
                    format!("record {} repeats an analyzed path", fingerprint),
                ));
                continue;
            }
            self.add_file(file, &mut build);
        }

        attach_methods(&mut build.table);

        debug!(
            "Symbol table: {} symbols from {} files ({} duplicates)",
            build.table.len(),
            build.files.len(),
            build.duplicates.len()
        );

        build
    }

    fn add_file(&self, file: SourceFile, build: &mut SymbolTableBuild) {
        let module = file
            .module
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| module_path(&file.path));

        let has_module_symbol = file
            .symbols
            .iter()
            .any(|record| SymbolKind::from_record(&record.kind) == Some(SymbolKind::Module));
        let synthesized = (!has_module_symbol
            && file.calls.iter().any(|call| is_module_caller(&call.caller)))
        .then(|| SymbolRecord {
            name: MODULE_SYMBOL.to_string(),
            kind: "module".to_string(),
            ..SymbolRecord::default()
        });

        let mut pending: Vec<(SymbolKind, &SymbolRecord, String)> = Vec::new();
        for record in &file.symbols {
            match SymbolKind::from_record(&record.kind) {
                Some(kind) => pending.push((kind, record, local_name(kind, record))),
                None => build.skipped.push(SkippedFile::new(
                    file.path.clone(),
                    SkipReason::Partial,
                    format!("unknown symbol kind '{}' for '{}'", record.kind, record.name),
                )),
            }
        }

        if let Some(record) = &synthesized {
            pending.push((SymbolKind::Module, record, MODULE_SYMBOL.to_string()));
        }

        pending.sort_by(|(_, a, na), (_, b, nb)| {
            (a.span.start_line, a.span.start_col)
                .cmp(&(b.span.start_line, b.span.start_col))
                .then_with(|| na.cmp(nb))
        });

        for (kind, record, name) in pending {
            let scope = record.scope.clone().filter(|s| !s.trim().is_empty());
            let local_path = match &scope {
                Some(scope) => format!("{}.{}", scope, name),
                None => name.clone(),
            };
            let qualified_name = if module.is_empty() {
                local_path
            } else {
                format!("{}.{}", module, local_path)
            };

            if let Some(kept) = build.table.lookup(&qualified_name) {
                build.duplicates.push(DuplicateSymbol {
                    qualified_name,
                    kept,
                    file: file.path.clone(),
                    span: record.span,
                });
                continue;
            }

            build.table.push(Symbol {
                id: SymbolId(0),
                name,
                qualified_name,
                kind,
                module: module.clone(),
                scope,
                file: file.path.clone(),
                language: file.language.clone(),
                span: record.span,
                decorators: record.decorators.clone(),
                fields: record.fields.clone(),
                methods: Vec::new(),
                registered: record.registered,
            });
        }

        build.files.push(FileUnit {
            path: file.path.clone(),
            language: file.language.clone(),
            module,
            imports: file.imports.clone(),
            calls: file.calls.clone(),
        });
    }
}

/// Module path derived from a file path: `src/app/user.py` becomes `src.app.user`
pub fn module_path(path: &Path) -> String {
    let mut parts: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    if let Some(last) = parts.last_mut() {
        if let Some((stem, _)) = last.rsplit_once('.') {
            if !stem.is_empty() {
                *last = stem.to_string();
            }
        }
    }
    if parts.len() > 1 && matches!(parts.last().map(String::as_str), Some("__init__" | "index" | "mod")) {
        parts.pop();
    }

    parts.join(".")
}

/// Local name of a declaration, synthesizing positional names for anonymous constructs
fn local_name(kind: SymbolKind, record: &SymbolRecord) -> String {
    let name = record.name.trim();
    let position = format!("{}:{}", record.span.start_line, record.span.start_col);

    if kind == SymbolKind::Module && (name.is_empty() || name == MODULE_SYMBOL) {
        return MODULE_SYMBOL.to_string();
    }
    if name.is_empty() {
        return format!("<anonymous@{}>", position);
    }
    if name.starts_with('<') && name.ends_with('>') {
        let inner = name.trim_start_matches('<').trim_end_matches('>');
        return format!("<{}@{}>", inner, position);
    }
    name.to_string()
}

/// Calls attributed to module-level code name no caller or `<module>`
pub fn is_module_caller(caller: &str) -> bool {
    let caller = caller.trim();
    caller.is_empty() || caller == MODULE_SYMBOL
}

/// Record method names on their enclosing classes
fn attach_methods(table: &mut SymbolTable) {
    let mut owned: BTreeMap<SymbolId, Vec<String>> = BTreeMap::new();
    for symbol in &table.symbols {
        if !matches!(symbol.kind, SymbolKind::Method | SymbolKind::Function) {
            continue;
        }
        let Some(scope) = &symbol.scope else { continue };
        let owner = if symbol.module.is_empty() {
            scope.clone()
        } else {
            format!("{}.{}", symbol.module, scope)
        };
        if let Some(class_id) = table.lookup(&owner) {
            owned.entry(class_id).or_default().push(symbol.name.clone());
        }
    }

    for (class_id, methods) in owned {
        if let Some(class) = table.symbols.get_mut(class_id.index()) {
            if class.kind == SymbolKind::Class {
                class.methods = methods;
            }
        }
    }
}
