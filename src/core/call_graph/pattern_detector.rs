// src/core/call_graph/pattern_detector.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain_entity_detector::tokenize;
use super::{SymbolId, SymbolKind, SymbolTable};

const CRUD_VERBS: &[&str] = &["create", "read", "get", "update", "delete", "save", "find"];
const AUTH_TERMS: &[&str] = &[
    "login", "logout", "authenticate", "authorize", "verify", "validate", "token", "session", "permission",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    Crud,
    Authentication,
}

/// A group of callables sharing a recognizable role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPattern {
    pub name: String,
    pub kind: PatternKind,
    pub description: String,
    /// Members in id order
    pub symbols: Vec<SymbolId>,
}

struct PatternRule {
    kind: PatternKind,
    name: &'static str,
    description: &'static str,
    terms: &'static [&'static str],
    min_members: usize,
}

const RULES: &[PatternRule] = &[
    PatternRule {
        kind: PatternKind::Crud,
        name: "crud_operations",
        description: "Create/read/update/delete operations",
        terms: CRUD_VERBS,
        min_members: 3,
    },
    PatternRule {
        kind: PatternKind::Authentication,
        name: "authentication_flow",
        description: "Authentication and authorization operations",
        terms: AUTH_TERMS,
        min_members: 2,
    },
];

/// Detects behavior patterns from function and method names
#[derive(Debug, Default)]
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect_patterns(&self, table: &SymbolTable) -> Vec<BehaviorPattern> {
        let callables: Vec<(SymbolId, Vec<String>)> = table
            .iter()
            .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method))
            .map(|s| (s.id, tokenize(&s.name)))
            .collect();

        RULES
            .iter()
            .filter_map(|rule| {
                let members: Vec<SymbolId> = callables
                    .iter()
                    .filter(|(_, tokens)| tokens.iter().any(|t| rule.terms.contains(&t.as_str())))
                    .map(|(id, _)| *id)
                    .collect();

                if members.len() < rule.min_members {
                    return None;
                }
                debug!("Pattern {}: {} members", rule.name, members.len());
                Some(BehaviorPattern {
                    name: rule.name.to_string(),
                    kind: rule.kind,
                    description: rule.description.to_string(),
                    symbols: members,
                })
            })
            .collect()
    }
}
