// src/core/engine.rs
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DigestError;
use super::call_graph::{AnalysisEngine, AnalysisResult};
use super::loader::RecordLoader;

/// Default configuration file written by `init`
pub const CONFIG_FILE_NAME: &str = "codedigest.toml";

/// Orchestrates record loading, analysis and export for the CLI
pub struct Engine {
    config: Config,
}

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_depth: Option<usize>,
    pub flows_per_entrypoint: Option<usize>,
    pub entrypoint_threshold: Option<f64>,
    pub top_k: Option<usize>,
    pub entity_threshold: Option<f64>,
    pub no_noise_filter: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(depth) = self.max_depth {
            config.flows.max_depth = depth;
        }
        if let Some(cap) = self.flows_per_entrypoint {
            config.flows.max_flows_per_entrypoint = cap;
        }
        if let Some(threshold) = self.entrypoint_threshold {
            config.entrypoints.threshold = threshold;
        }
        if let Some(k) = self.top_k {
            config.entrypoints.top_k = Some(k);
        }
        if let Some(threshold) = self.entity_threshold {
            config.entities.threshold = threshold;
        }
        if self.no_noise_filter {
            config.noise_filter.enabled = false;
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Directory of record files, or a single record / bundle file
    pub input: PathBuf,
    /// Output file; stdout when absent
    pub output: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    /// Compact instead of pretty JSON
    pub compact: bool,
}

/// JSON document written by `analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub metadata: ExportMetadata,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub tool: String,
    pub version: String,
    pub generated_at: String,
    /// Fingerprint of `analysis`; identical inputs give identical fingerprints
    pub fingerprint: String,
}

impl ExportEnvelope {
    pub fn new(analysis: AnalysisResult) -> crate::error::Result<Self> {
        Ok(Self {
            metadata: ExportMetadata {
                tool: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                fingerprint: analysis.fingerprint()?,
            },
            analysis,
        })
    }
}

impl Engine {
    /// Create an engine from the configuration file (or defaults)
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self { config })
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load records, run the analysis and return the result
    pub async fn run_analysis(&self, input: &Path, overrides: &ConfigOverrides) -> Result<AnalysisResult> {
        let mut config = self.config.clone();
        overrides.apply(&mut config);
        let analysis_engine = AnalysisEngine::new(&config).context("Invalid analysis configuration")?;

        info!("📂 Loading records from {}", input.display());
        let loaded = RecordLoader::new(&config.input)
            .load_path(input)
            .await
            .with_context(|| format!("Failed to load records from {}", input.display()))?;

        Ok(analysis_engine.run(loaded.files, loaded.skipped))
    }

    /// Analyze and write the export envelope
    pub async fn analyze(&self, options: AnalyzeOptions) -> Result<()> {
        let result = self.run_analysis(&options.input, &options.overrides).await?;

        let summary = result.summary();
        info!("📊 Analysis summary:");
        info!("  - {} files analyzed, {} skipped", summary.files_analyzed, summary.files_skipped);
        info!("  - {} symbols, {} call edges", summary.symbols.total, summary.full_graph.edge_count);
        info!("  - {} entry points, {} flows", summary.entrypoint_count, summary.flow_count);
        info!("  - {} domain entities", summary.domain_entity_count);
        for skipped in result.skipped_files() {
            warn!("  ⚠️ {} ({:?}): {}", skipped.path.display(), skipped.reason, skipped.detail);
        }

        let envelope = ExportEnvelope::new(result)?;
        let json = if options.compact {
            serde_json::to_string(&envelope)?
        } else {
            serde_json::to_string_pretty(&envelope)?
        };

        match options.output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("✅ Analysis written to {}", path.display());
            }
            None => println!("{}", json),
        }

        Ok(())
    }

    /// Write the default configuration file into `path` (current directory by default)
    pub async fn init(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let target_dir = match path {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        info!("Initializing codedigest in: {}", target_dir.display());

        let config_path = target_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() && !force {
            return Err(DigestError::Config(format!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            ))
            .into());
        }

        tokio::fs::create_dir_all(&target_dir).await?;
        Config::default().save(&config_path)?;
        info!("✅ Wrote {}", config_path.display());
        Ok(config_path)
    }

    /// Validate the loaded configuration
    pub async fn check_config(&self) -> Result<()> {
        self.config.validate()?;
        info!("✅ Configuration is valid");
        info!(
            "  - entrypoint threshold {:.2}, entity threshold {:.2}",
            self.config.entrypoints.threshold, self.config.entities.threshold
        );
        info!(
            "  - max depth {}, {} flows per entrypoint, noise filter {}",
            self.config.flows.max_depth,
            self.config.flows.max_flows_per_entrypoint,
            if self.config.noise_filter.enabled { "on" } else { "off" }
        );
        Ok(())
    }
}
