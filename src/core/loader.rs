// src/core/loader.rs
use std::path::{Path, PathBuf};
use ignore::WalkBuilder;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::InputConfig;
use crate::error::{DigestError, Result};
use super::call_graph::{SkipReason, SkippedFile};
use super::records::SourceFile;

/// Reads front-end record files from disk, one task per file
pub struct RecordLoader {
    extensions: Vec<String>,
    respect_ignore_files: bool,
}

/// Records read from disk plus the files that could not be used
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
}

impl RecordLoader {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            extensions: config
                .record_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            respect_ignore_files: config.respect_ignore_files,
        }
    }

    /// Load a directory of record files, or a single record / bundle file
    pub async fn load_path(&self, input: &Path) -> Result<LoadedRecords> {
        if input.is_dir() {
            let paths = self.discover(input);
            info!("Found {} record files in {}", paths.len(), input.display());
            Ok(self.load_files(paths).await)
        } else if input.is_file() {
            Ok(self.load_files(vec![input.to_path_buf()]).await)
        } else {
            Err(DigestError::FileSystem(format!("input {} does not exist", input.display())))
        }
    }

    /// Record files under `dir`, sorted by path
    pub fn discover(&self, dir: &Path) -> Vec<PathBuf> {
        // Use ignore crate to respect .gitignore and custom patterns
        let walker = WalkBuilder::new(dir)
            .hidden(false)
            .git_ignore(self.respect_ignore_files)
            .git_exclude(self.respect_ignore_files)
            .ignore(self.respect_ignore_files)
            .require_git(false)
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && self.is_record_file(path) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        paths
    }

    /// Read and parse every file concurrently; failures become skip entries
    pub async fn load_files(&self, paths: Vec<PathBuf>) -> LoadedRecords {
        let mut tasks = JoinSet::new();
        for path in paths {
            tasks.spawn(async move {
                let outcome = load_record_file(&path).await;
                (path, outcome)
            });
        }

        let mut loaded = LoadedRecords::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(files))) => loaded.files.extend(files),
                Ok((path, Err(skip))) => {
                    warn!("Skipping {}: {}", path.display(), skip.detail);
                    loaded.skipped.push(skip);
                }
                Err(e) => warn!("Record loading task failed: {}", e),
            }
        }

        debug!("Loaded {} source records, skipped {} files", loaded.files.len(), loaded.skipped.len());
        loaded
    }

    fn is_record_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
    }
}

/// One record object, or an array of them
async fn load_record_file(path: &Path) -> std::result::Result<Vec<SourceFile>, SkippedFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SkippedFile::new(path, SkipReason::Unreadable, e.to_string()))?;

    let malformed = |e: serde_json::Error| SkippedFile::new(path, SkipReason::Malformed, e.to_string());
    let value: serde_json::Value = serde_json::from_str(&content).map_err(malformed)?;

    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value::<SourceFile>(item).map_err(malformed))
            .collect(),
        other => Ok(vec![serde_json::from_value::<SourceFile>(other).map_err(malformed)?]),
    }
}
