use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DigestError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record discovery settings
    pub input: InputConfig,

    /// Noise filtering of the call graph
    pub noise_filter: NoiseFilterConfig,

    /// Entrypoint scoring
    pub entrypoints: EntrypointConfig,

    /// Execution flow tracing
    pub flows: FlowConfig,

    /// Domain entity classification
    pub entities: EntityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Extensions of front-end record files
    pub record_extensions: Vec<String>,

    /// Follow .gitignore / .ignore files while walking the input directory
    pub respect_ignore_files: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseFilterConfig {
    /// When disabled the filtered view is a copy of the full graph
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntrypointConfig {
    /// Candidates must score strictly above this value
    pub threshold: f64,

    /// Maximum number of selected entrypoints (unlimited when absent)
    pub top_k: Option<usize>,

    /// Regexes matched against a symbol's short name to detect a main role
    pub main_patterns: Vec<String>,

    /// Regexes matched against decorators to detect registered handlers
    pub handler_decorators: Vec<String>,

    /// Feature weights
    pub weights: EntrypointWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntrypointWeights {
    pub naming_pattern: f64,
    pub no_incoming_edges: f64,
    pub module_level: f64,
    pub registered_handler: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Maximum number of symbols in a single flow
    pub max_depth: usize,

    /// Maximum number of flows emitted per entrypoint
    pub max_flows_per_entrypoint: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Classes must score strictly above this value
    pub threshold: f64,

    /// Number of distinct service-like callers at which the reference feature saturates
    pub service_reference_saturation: usize,

    /// Regexes identifying service / use-case like callers
    pub service_patterns: Vec<String>,

    /// Class name suffixes that mark infrastructure rather than business objects
    pub infrastructure_suffixes: Vec<String>,

    /// Decorators that mark data models
    pub data_decorators: Vec<String>,

    /// Feature weights
    pub weights: EntityWeights,

    /// Ordered category lexicon; the first matching category wins
    pub categories: Vec<CategoryRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityWeights {
    pub data_shape: f64,
    pub naming: f64,
    pub service_references: f64,
    pub lexicon: f64,
    pub data_decorator: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            noise_filter: NoiseFilterConfig::default(),
            entrypoints: EntrypointConfig::default(),
            flows: FlowConfig::default(),
            entities: EntityConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            record_extensions: strings(&["json"]),
            respect_ignore_files: true,
        }
    }
}

impl Default for NoiseFilterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for EntrypointConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            top_k: None,
            main_patterns: strings(&["^main$", "^__main__$", "^run$", "^start$", "^app$"]),
            handler_decorators: strings(&[
                r"(^|\.)route$",
                r"^(app|router|api|bp)\.(get|post|put|patch|delete)$",
                r"(^|\.)task$",
                r"(^|\.)command$",
                "RequestMapping$",
                "(Get|Post|Put|Delete)Mapping$",
                "EventHandler$",
                "Scheduled$",
            ]),
            weights: EntrypointWeights::default(),
        }
    }
}

impl Default for EntrypointWeights {
    fn default() -> Self {
        Self {
            naming_pattern: 0.4,
            no_incoming_edges: 0.3,
            module_level: 0.2,
            registered_handler: 0.1,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_flows_per_entrypoint: 3,
        }
    }
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            service_reference_saturation: 3,
            service_patterns: strings(&[
                r"(?i)service",
                r"(?i)use_?case",
                r"(?i)interactor",
                r"(?i)handler",
                r"(?i)controller",
                r"(?i)command",
                r"(?i)manager",
                r"(?i)repository",
            ]),
            infrastructure_suffixes: strings(&[
                "Service", "Manager", "Controller", "Handler", "Repository", "Factory",
                "Helper", "Util", "Utils", "Config", "Settings", "Exception", "Error",
                "Test", "Tests", "Mixin", "Base", "Client", "Adapter", "Provider", "View",
                "Router", "Middleware", "Builder", "Parser", "Engine",
            ]),
            data_decorators: strings(&[
                "dataclass", "dataclasses.dataclass", "BaseModel", "Entity", "Table",
                "Document", "attr.s", "attrs.define",
            ]),
            weights: EntityWeights::default(),
            categories: vec![
                CategoryRule::new("User", &["user", "customer", "client", "member", "profile", "person"]),
                CategoryRule::new("Account", &["account", "balance", "ledger"]),
                CategoryRule::new("Payment", &["payment", "transaction", "invoice", "billing", "charge", "refund"]),
                CategoryRule::new("Order", &["order", "cart", "checkout", "purchase", "shipment"]),
                CategoryRule::new("Wallet", &["wallet", "credit", "debit"]),
                CategoryRule::new("Product", &["product", "item", "catalog", "inventory", "sku"]),
                CategoryRule::new("Auth", &["session", "token", "permission", "role", "credential"]),
                CategoryRule::new("Notification", &["notification", "message", "email", "sms"]),
                CategoryRule::new("Location", &["address", "location", "contact", "phone"]),
            ],
        }
    }
}

impl Default for EntityWeights {
    fn default() -> Self {
        Self {
            data_shape: 0.35,
            naming: 0.25,
            service_references: 0.2,
            lexicon: 0.1,
            data_decorator: 0.1,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DigestError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DigestError::Toml(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(DigestError::Config(format!(
                        "configuration file {} does not exist",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "codedigest.toml",
                    "Codedigest.toml",
                    ".codedigest.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// This is the only fatal error class of an analysis run and is checked before any
    /// record is processed.
    pub fn validate(&self) -> Result<()> {
        check_unit("entrypoints.threshold", self.entrypoints.threshold)?;
        check_unit("entities.threshold", self.entities.threshold)?;

        let ep = &self.entrypoints.weights;
        for (name, weight) in [
            ("entrypoints.weights.naming_pattern", ep.naming_pattern),
            ("entrypoints.weights.no_incoming_edges", ep.no_incoming_edges),
            ("entrypoints.weights.module_level", ep.module_level),
            ("entrypoints.weights.registered_handler", ep.registered_handler),
        ] {
            check_weight(name, weight)?;
        }

        let en = &self.entities.weights;
        for (name, weight) in [
            ("entities.weights.data_shape", en.data_shape),
            ("entities.weights.naming", en.naming),
            ("entities.weights.service_references", en.service_references),
            ("entities.weights.lexicon", en.lexicon),
            ("entities.weights.data_decorator", en.data_decorator),
        ] {
            check_weight(name, weight)?;
        }

        if self.flows.max_depth == 0 {
            return Err(DigestError::Config("flows.max_depth must be at least 1".to_string()));
        }
        if self.flows.max_flows_per_entrypoint == 0 {
            return Err(DigestError::Config(
                "flows.max_flows_per_entrypoint must be at least 1".to_string(),
            ));
        }
        if self.entrypoints.top_k == Some(0) {
            return Err(DigestError::Config("entrypoints.top_k must be at least 1".to_string()));
        }
        if self.entities.service_reference_saturation == 0 {
            return Err(DigestError::Config(
                "entities.service_reference_saturation must be at least 1".to_string(),
            ));
        }
        if self.input.record_extensions.is_empty() {
            return Err(DigestError::Config("input.record_extensions must not be empty".to_string()));
        }

        for rule in &self.entities.categories {
            if rule.category.trim().is_empty() || rule.keywords.is_empty() {
                return Err(DigestError::Config(format!(
                    "category rule '{}' needs a name and at least one keyword",
                    rule.category
                )));
            }
        }

        for pattern in self
            .entrypoints
            .main_patterns
            .iter()
            .chain(&self.entrypoints.handler_decorators)
            .chain(&self.entities.service_patterns)
        {
            regex::Regex::new(pattern).map_err(|source| DigestError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(DigestError::Config(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

fn check_weight(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DigestError::Config(format!("{name} must be a non-negative number, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_depth_is_rejected() {
        let mut config = Config::default();
        config.flows.max_depth = 0;
        assert!(matches!(config.validate(), Err(DigestError::Config(_))));
    }

    #[test]
    fn negative_depth_fails_to_parse() {
        let parsed: std::result::Result<Config, _> = toml::from_str("[flows]\nmax_depth = -1\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = Config::default();
        config.entrypoints.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.entities.weights.naming = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_regex_is_reported() {
        let mut config = Config::default();
        config.entrypoints.main_patterns.push("(unclosed".to_string());
        assert!(matches!(config.validate(), Err(DigestError::InvalidPattern { .. })));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[flows]\nmax_depth = 8\n").unwrap();
        assert_eq!(config.flows.max_depth, 8);
        assert_eq!(config.flows.max_flows_per_entrypoint, 3);
        assert_eq!(config.entrypoints.threshold, 0.3);
    }

    #[test]
    fn save_and_load_preserve_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codedigest.toml");
        let mut config = Config::default();
        config.entrypoints.top_k = Some(4);
        config.noise_filter.enabled = false;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
