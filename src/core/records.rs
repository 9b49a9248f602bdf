// src/core/records.rs
//! Normalized per-file records produced by a language front end.
//!
//! These are the only input the engine consumes. They are dropped once the symbol table and
//! resolved calls have been built.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Source position of a declaration or call site (1-based lines, 0-based columns)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self { start_line, start_col, end_line, end_col }
    }

    /// Span covering a single line
    pub fn line(line: u32) -> Self {
        Self::new(line, 0, line, 0)
    }
}

/// Everything the front end extracted from one source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// File path relative to project root
    pub path: PathBuf,

    /// Language tag (python, javascript, ...)
    #[serde(default)]
    pub language: String,

    /// Explicit module path; derived from `path` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    #[serde(default)]
    pub symbols: Vec<SymbolRecord>,

    #[serde(default)]
    pub imports: Vec<ImportRecord>,

    #[serde(default)]
    pub calls: Vec<CallRecord>,
}

/// A declared function, method, class or module-level code unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    /// Local name; empty for anonymous constructs
    #[serde(default)]
    pub name: String,

    /// Declaration kind as reported by the front end
    pub kind: String,

    #[serde(default)]
    pub span: Span,

    /// Dotted path of enclosing declarations (`User` for a method of class `User`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,

    /// Attribute / field names declared on a class
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    /// Registered as an externally invocable command or handler
    #[serde(default)]
    pub registered: bool,
}

/// An import statement binding `alias` to `target`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    /// Local binding; defaults to the last segment of `target`, `*` for wildcard imports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Module path or fully qualified symbol name
    pub target: String,
}

impl ImportRecord {
    pub fn binding(&self) -> &str {
        match &self.alias {
            Some(alias) if !alias.is_empty() => alias,
            _ => last_segment(&self.target),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.binding() == "*"
    }
}

/// A call site inside `caller`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Local path of the calling symbol; empty or `<module>` for module-level code
    #[serde(default)]
    pub caller: String,

    /// Callee exactly as written (`save`, `self.save`, `storage.save`)
    pub callee: String,

    #[serde(default)]
    pub span: Span,
}

impl SourceFile {
    pub fn new<P: Into<PathBuf>>(path: P, language: &str) -> Self {
        Self {
            path: path.into(),
            language: language.to_string(),
            ..Self::default()
        }
    }

    /// SHA-256 of the record's canonical JSON form
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        format!("{:x}", hasher.finalize())
    }

    pub fn with_symbol(mut self, name: &str, kind: &str, line: u32) -> Self {
        self.symbols.push(SymbolRecord {
            name: name.to_string(),
            kind: kind.to_string(),
            span: Span::line(line),
            ..SymbolRecord::default()
        });
        self
    }

    pub fn with_import(mut self, alias: Option<&str>, target: &str) -> Self {
        self.imports.push(ImportRecord {
            alias: alias.map(str::to_string),
            target: target.to_string(),
        });
        self
    }

    pub fn with_call(mut self, caller: &str, callee: &str, line: u32) -> Self {
        self.calls.push(CallRecord {
            caller: caller.to_string(),
            callee: callee.to_string(),
            span: Span::line(line),
        });
        self
    }
}

/// Last `.` or `::` separated segment of a dotted name
pub fn last_segment(name: &str) -> &str {
    name.rsplit(|c| c == '.' || c == ':')
        .find(|segment| !segment.is_empty())
        .unwrap_or(name)
}
