use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::{AnalyzeOptions, ConfigOverrides, Engine};

#[derive(Parser)]
#[command(name = "codedigest")]
#[command(about = "Semantic call graph, entrypoints, execution flows and domain entities from front-end records")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze front-end records and write the result as JSON
    Analyze {
        /// Directory of record files, or a single record/bundle file
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of symbols in a flow
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum number of flows per entrypoint
        #[arg(long)]
        flows_per_entrypoint: Option<usize>,

        /// Entrypoint score threshold
        #[arg(long)]
        entrypoint_threshold: Option<f64>,

        /// Keep at most this many entrypoints
        #[arg(long)]
        top_k: Option<usize>,

        /// Domain entity score threshold
        #[arg(long)]
        entity_threshold: Option<f64>,

        /// Keep builtin calls and isolated symbols in the filtered graph
        #[arg(long)]
        no_noise_filter: bool,

        /// Write compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration file
    CheckConfig,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze {
                input,
                output,
                max_depth,
                flows_per_entrypoint,
                entrypoint_threshold,
                top_k,
                entity_threshold,
                no_noise_filter,
                compact,
            } => {
                let engine = Engine::new(self.config.as_deref()).await?;
                engine
                    .analyze(AnalyzeOptions {
                        input,
                        output,
                        overrides: ConfigOverrides {
                            max_depth,
                            flows_per_entrypoint,
                            entrypoint_threshold,
                            top_k,
                            entity_threshold,
                            no_noise_filter,
                        },
                        compact,
                    })
                    .await
            }
            Commands::Init { path, force } => Engine::init(path, force).await.map(|_| ()),
            Commands::CheckConfig => {
                let engine = Engine::new(self.config.as_deref()).await?;
                engine.check_config().await
            }
        }
    }
}
