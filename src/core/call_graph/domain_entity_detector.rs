// src/core/call_graph/domain_entity_detector.rs
use std::collections::{BTreeMap, BTreeSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CategoryRule, EntityConfig, EntityWeights};
use crate::core::records::last_segment;
use crate::error::{DigestError, Result};
use super::scoring::{exceeds, FeatureContribution, FeatureTable};
use super::{CallGraph, Symbol, SymbolId, SymbolKind, SymbolTable};

/// Label used when no lexicon category matches
pub const OTHER_CATEGORY: &str = "Other";

/// Classifies class symbols as business-domain entities
pub struct DomainEntityDetector {
    threshold: f64,
    saturation: usize,
    weights: EntityWeights,
    service_patterns: Vec<Regex>,
    infrastructure_suffixes: Vec<String>,
    data_decorators: Vec<String>,
    categories: Vec<CategoryRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityFeature {
    DataShape,
    Naming,
    ServiceReferences,
    Lexicon,
    DataDecorator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEntity {
    pub symbol: SymbolId,
    pub qualified_name: String,
    pub category: String,
    pub score: f64,
    pub features: Vec<FeatureContribution<EntityFeature>>,
    pub fields: Vec<String>,
    pub methods: Vec<String>,
    /// Symbols that call the class directly (constructors)
    pub creation_points: Vec<SymbolId>,
}

impl DomainEntityDetector {
    pub fn new(config: &EntityConfig) -> Result<Self> {
        let service_patterns = config
            .service_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| DigestError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            threshold: config.threshold,
            saturation: config.service_reference_saturation.max(1),
            weights: config.weights.clone(),
            service_patterns,
            infrastructure_suffixes: config.infrastructure_suffixes.clone(),
            data_decorators: config.data_decorators.clone(),
            categories: config.categories.clone(),
        })
    }

    /// Score every class in the table; those above the threshold become entities.
    ///
    /// Service references are counted on the full graph so that filtering never hides them.
    pub fn detect_entities(&self, table: &SymbolTable, graph: &CallGraph) -> Vec<DomainEntity> {
        let methods = methods_by_owner(table);

        let entities: Vec<DomainEntity> = table
            .iter()
            .filter(|symbol| symbol.kind == SymbolKind::Class)
            .map(|class| {
                let owned = methods.get(class.qualified_name.as_str()).map_or(&[][..], Vec::as_slice);
                self.evaluate(class, owned, table, graph)
            })
            .filter(|candidate| {
                let keep = exceeds(candidate.score, self.threshold);
                if !keep {
                    debug!("Not a domain entity: {} ({:.2})", candidate.qualified_name, candidate.score);
                }
                keep
            })
            .collect();

        for entity in &entities {
            debug!("Domain entity: {} [{}] ({:.2})", entity.qualified_name, entity.category, entity.score);
        }
        entities
    }

    /// Score one class; `methods` are the ids of methods declared in its scope
    pub fn evaluate(&self, class: &Symbol, methods: &[SymbolId], table: &SymbolTable, graph: &CallGraph) -> DomainEntity {
        let weights = &self.weights;
        let category = self.categorize(&class.name);

        let attributes = class.fields.len();
        let behaviour = class.methods.len();
        let shape = if attributes + behaviour == 0 {
            0.0
        } else {
            attributes as f64 / (attributes + behaviour) as f64
        };

        let service_callers = self.service_callers(class, methods, table, graph);
        let references = (service_callers.len() as f64 / self.saturation as f64).min(1.0);

        let mut features = FeatureTable::new();
        features
            .add(EntityFeature::DataShape, weights.data_shape, shape)
            .flag(EntityFeature::Naming, weights.naming, self.is_entity_name(&class.name))
            .add(EntityFeature::ServiceReferences, weights.service_references, references)
            .flag(EntityFeature::Lexicon, weights.lexicon, category != OTHER_CATEGORY)
            .flag(EntityFeature::DataDecorator, weights.data_decorator, self.has_data_decorator(class));

        let creation_points: BTreeSet<SymbolId> = graph
            .incoming(class.id)
            .filter(|edge| edge.caller != class.id)
            .map(|edge| edge.caller)
            .collect();

        DomainEntity {
            symbol: class.id,
            qualified_name: class.qualified_name.clone(),
            category,
            score: features.score(),
            features: features.into_rows(),
            fields: class.fields.clone(),
            methods: class.methods.clone(),
            creation_points: creation_points.into_iter().collect(),
        }
    }

    /// First lexicon category matching any name token, else "Other"
    pub fn categorize(&self, name: &str) -> String {
        let tokens = tokenize(name);
        self.categories
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|keyword| tokens.iter().any(|token| fuzzy_match(token, &keyword.to_lowercase())))
            })
            .map(|rule| rule.category.clone())
            .unwrap_or_else(|| OTHER_CATEGORY.to_string())
    }

    /// Capitalized singular noun without an infrastructure suffix
    fn is_entity_name(&self, name: &str) -> bool {
        let capitalized = name.chars().next().map_or(false, |c| c.is_ascii_uppercase());
        let word_like = name.chars().all(|c| c.is_ascii_alphanumeric());
        let infrastructure = self
            .infrastructure_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()));
        capitalized && word_like && !infrastructure && !looks_plural(name)
    }

    fn has_data_decorator(&self, class: &Symbol) -> bool {
        class.decorators.iter().any(|decorator| {
            let decorator = decorator.trim_start_matches('@');
            let decorator = decorator.split('(').next().unwrap_or(decorator).trim();
            self.data_decorators
                .iter()
                .any(|known| decorator == known.as_str() || last_segment(decorator) == known.as_str())
        })
    }

    /// Distinct service-like callers of the class or its methods, outside the class itself
    fn service_callers(&self, class: &Symbol, methods: &[SymbolId], table: &SymbolTable, graph: &CallGraph) -> BTreeSet<SymbolId> {
        let own: BTreeSet<SymbolId> = std::iter::once(class.id).chain(methods.iter().copied()).collect();

        own.iter()
            .flat_map(|&id| graph.incoming(id))
            .map(|edge| edge.caller)
            .filter(|caller| !own.contains(caller))
            .filter(|&caller| {
                let name = table.qualified_name(caller);
                self.service_patterns.iter().any(|pattern| pattern.is_match(name))
            })
            .collect()
    }
}

/// Method ids keyed by the qualified name of their enclosing class
fn methods_by_owner(table: &SymbolTable) -> BTreeMap<&str, Vec<SymbolId>> {
    let mut owners: BTreeMap<&str, Vec<SymbolId>> = BTreeMap::new();
    for symbol in table.iter().filter(|s| s.kind.is_callable() && s.scope.is_some()) {
        if let Some((owner, _)) = symbol.qualified_name.rsplit_once('.') {
            owners.entry(owner).or_default().push(symbol.id);
        }
    }
    owners
}

fn looks_plural(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with('s')
        && !["ss", "us", "is", "ius", "sis"].iter().any(|ending| lower.ends_with(ending))
}

/// Split `OrderLineItem`, `order_line_item` or `HTTPRequest` into lowercase words
pub fn tokenize(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for part in name.split(|c: char| !c.is_ascii_alphanumeric()).filter(|p| !p.is_empty()) {
        let chars: Vec<char> = part.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0
                && c.is_ascii_uppercase()
                && (chars[i - 1].is_ascii_lowercase()
                    || chars[i - 1].is_ascii_digit()
                    || chars.get(i + 1).map_or(false, |n| n.is_ascii_lowercase()) && chars[i - 1].is_ascii_uppercase());
            if boundary && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            current.push(c.to_ascii_lowercase());
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens
}

fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies").filter(|stem| !stem.is_empty()) {
        return format!("{}y", stem);
    }
    word.strip_suffix("es")
        .filter(|stem| stem.ends_with('s') || stem.ends_with('x') || stem.ends_with("ch") || stem.ends_with("sh"))
        .or_else(|| word.strip_suffix('s').filter(|stem| !stem.ends_with('s')))
        .unwrap_or(word)
        .to_string()
}

/// Exact, plural-stripped, prefix, or one edit apart for longer tokens
pub fn fuzzy_match(token: &str, keyword: &str) -> bool {
    if token == keyword || singular(token) == keyword {
        return true;
    }
    if keyword.len() >= 3 && token.starts_with(keyword) {
        return true;
    }
    token.len() >= 5 && levenshtein(token, keyword) <= 1
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::{CallGraphBuilder, ReferenceResolver, SymbolTableBuilder};
    use crate::core::records::SourceFile;

    fn detector() -> DomainEntityDetector {
        DomainEntityDetector::new(&EntityConfig::default()).unwrap()
    }

    fn analyze(files: Vec<SourceFile>) -> (SymbolTable, CallGraph) {
        let build = SymbolTableBuilder::new().build(files);
        let resolved = ReferenceResolver::new(&build.table).resolve_all(&build.files);
        let graph = CallGraphBuilder::new().build(&build.table, &resolved.calls);
        (build.table, graph)
    }

    fn class_with_fields(path: &str, name: &str, fields: &[&str]) -> SourceFile {
        let mut file = SourceFile::new(path, "python").with_symbol(name, "class", 1);
        file.symbols[0].fields = fields.iter().map(|f| f.to_string()).collect();
        file
    }

    #[test]
    fn tokenizes_camel_snake_and_acronyms() {
        assert_eq!(tokenize("OrderLineItem"), vec!["order", "line", "item"]);
        assert_eq!(tokenize("payment_record"), vec!["payment", "record"]);
        assert_eq!(tokenize("HTTPRequest"), vec!["http", "request"]);
    }

    #[test]
    fn fuzzy_matching_covers_plurals_prefixes_and_typos() {
        assert!(fuzzy_match("users", "user"));
        assert!(fuzzy_match("addresses", "address"));
        assert!(fuzzy_match("categories", "category"));
        assert!(fuzzy_match("ordering", "order"));
        assert!(!fuzzy_match("paymnet", "payment"));
        assert!(fuzzy_match("paymant", "payment"));
        assert!(!fuzzy_match("use", "user"));
    }

    #[test]
    fn categories_follow_lexicon_order() {
        let detector = detector();
        assert_eq!(detector.categorize("CustomerProfile"), "User");
        assert_eq!(detector.categorize("PaymentOrder"), "Payment");
        assert_eq!(detector.categorize("ShoppingCart"), "Order");
        assert_eq!(detector.categorize("Widget"), OTHER_CATEGORY);
    }

    #[test]
    fn same_class_name_in_two_modules_yields_two_entities() {
        let (table, graph) = analyze(vec![
            class_with_fields("module_a.py", "User", &["id", "name", "email"]),
            class_with_fields("module_b.py", "User", &["id", "handle"]),
        ]);

        let entities = detector().detect_entities(&table, &graph);
        let names: Vec<&str> = entities.iter().map(|e| e.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["module_a.User", "module_b.User"]);
        assert!(entities.iter().all(|e| e.category == "User"));
        assert_eq!(entities[0].score, 0.7);
    }

    #[test]
    fn infrastructure_classes_are_rejected() {
        let mut file = SourceFile::new("svc.py", "python")
            .with_symbol("UserService", "class", 1)
            .with_symbol("create", "method", 2)
            .with_symbol("delete", "method", 5);
        file.symbols[1].scope = Some("UserService".to_string());
        file.symbols[2].scope = Some("UserService".to_string());

        let (table, graph) = analyze(vec![file]);
        assert!(detector().detect_entities(&table, &graph).is_empty());
    }

    #[test]
    fn service_references_and_creation_points_are_collected() {
        let mut model = class_with_fields("models.py", "Wallet", &["balance"])
            .with_symbol("credit", "method", 4);
        model.symbols[1].scope = Some("Wallet".to_string());
        model.symbols[0].decorators = vec!["@dataclass".to_string()];

        let services = SourceFile::new("services.py", "python")
            .with_import(None, "models.Wallet")
            .with_symbol("open_wallet_service", "function", 1)
            .with_symbol("TopUpUseCase", "class", 10)
            .with_symbol("execute", "method", 11)
            .with_call("open_wallet_service", "Wallet", 2)
            .with_call("TopUpUseCase.execute", "Wallet.credit", 12);
        let mut services = services;
        services.symbols[2].scope = Some("TopUpUseCase".to_string());

        let (table, graph) = analyze(vec![model, services]);
        let entities = detector().detect_entities(&table, &graph);
        let wallet = entities.iter().find(|e| e.qualified_name == "models.Wallet").unwrap();

        assert_eq!(wallet.category, "Wallet");
        assert_eq!(wallet.methods, vec!["credit".to_string()]);
        assert_eq!(wallet.creation_points, vec![table.lookup("services.open_wallet_service").unwrap()]);

        let references = wallet
            .features
            .iter()
            .find(|f| f.feature == EntityFeature::ServiceReferences)
            .unwrap();
        assert!((references.signal - 2.0 / 3.0).abs() < 1e-9);
        assert!(wallet.features.iter().any(|f| f.feature == EntityFeature::DataDecorator && f.signal == 1.0));
    }
}
