// src/core/call_graph/diagnostics.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::core::records::Span;
use super::SymbolId;

/// Why a file contributed fewer records than the front end produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// The record file could not be read
    Unreadable,
    /// The record file is not a valid front-end record
    Malformed,
    /// Another record already described the same path
    Duplicate,
    /// Some records of the file were dropped
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkippedFile {
    pub fn new<P: Into<PathBuf>>(path: P, reason: SkipReason, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason,
            detail: detail.into(),
        }
    }
}

/// A declaration whose qualified name was already taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSymbol {
    pub qualified_name: String,
    pub kept: SymbolId,
    pub file: PathBuf,
    pub span: Span,
}

/// A call site that matched several project symbols by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguousCall {
    pub caller: SymbolId,
    pub callee_text: String,
    pub span: Span,
    pub candidates: Vec<SymbolId>,
    pub chosen: SymbolId,
    pub confidence: f64,
}

/// A call record whose caller is not a declared symbol of its file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingCall {
    pub file: PathBuf,
    pub caller_text: String,
    pub callee_text: String,
    pub span: Span,
}

/// Non-fatal findings collected while building the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub duplicate_symbols: Vec<DuplicateSymbol>,
    pub ambiguous_calls: Vec<AmbiguousCall>,
    pub dangling_calls: Vec<DanglingCall>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.duplicate_symbols.is_empty()
            && self.ambiguous_calls.is_empty()
            && self.dangling_calls.is_empty()
    }
}

/// Sort skip records and fold repeated entries for the same path and reason.
///
/// Duplicate records stay distinct: their detail carries the dropped record's fingerprint.
pub fn normalize_skipped(mut skipped: Vec<SkippedFile>) -> Vec<SkippedFile> {
    skipped.sort();
    skipped.dedup_by(|a, b| {
        a.path == b.path && a.reason == b.reason && (a.reason != SkipReason::Duplicate || a.detail == b.detail)
    });
    skipped
}

/// Number of distinct paths that contributed nothing to the analysis
pub fn count_dropped_files(skipped: &[SkippedFile], analyzed: &HashSet<&Path>) -> usize {
    skipped
        .iter()
        .filter(|s| s.reason != SkipReason::Partial)
        .map(|s| s.path.as_path())
        .filter(|path| !analyzed.contains(path))
        .collect::<HashSet<_>>()
        .len()
}
