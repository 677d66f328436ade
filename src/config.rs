//! TOML configuration parsing and source resolution.
//!
//! Source locations are explicit configuration, resolved once before a run
//! starts. The ingestion core never searches the filesystem for "the first
//! CSV file" or similar.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::IngestError;
use crate::models::{IngestionSource, SourceKind};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the vector-database API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries per batch on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Payloads per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Concurrent in-flight batch requests.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_batch_size() -> usize {
    50
}
fn default_max_in_flight() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub documents: Option<DocumentsConfig>,
    pub practitioners: Option<TabularConfig>,
    pub products: Option<TabularConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    pub directory: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Overrides the kind's default (documents: required).
    pub required: Option<bool>,
    /// Overrides the default collection name (the kind slug).
    pub collection: Option<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            required: None,
            collection: None,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TabularConfig {
    pub file: Option<PathBuf>,
    /// Column whose value becomes the payload id. Row index otherwise.
    pub key_column: Option<String>,
    /// Columns joined into the searchable text. Empty means every column.
    #[serde(default)]
    pub text_columns: Vec<String>,
    /// Overrides the kind's default (tabular: optional).
    pub required: Option<bool>,
    pub collection: Option<String>,
}

impl Config {
    fn tabular(&self, kind: SourceKind) -> Option<&TabularConfig> {
        match kind {
            SourceKind::Practitioners => self.sources.practitioners.as_ref(),
            SourceKind::Products => self.sources.products.as_ref(),
            SourceKind::Documents => None,
        }
    }

    /// Resolve one source from config plus an optional CLI location override.
    ///
    /// Returns `Ok(None)` when the source has no location anywhere and is
    /// optional: there is nothing to ingest, which is a no-op success.
    pub fn resolve_source(
        &self,
        kind: SourceKind,
        location_override: Option<&Path>,
    ) -> Result<Option<IngestionSource>, IngestError> {
        let (location, required, collection, key_column, text_columns, include, exclude) =
            match kind {
                SourceKind::Documents => {
                    let cfg = self.sources.documents.clone().unwrap_or_default();
                    (
                        location_override
                            .map(Path::to_path_buf)
                            .or(cfg.directory),
                        cfg.required,
                        cfg.collection,
                        None,
                        Vec::new(),
                        cfg.include_globs,
                        cfg.exclude_globs,
                    )
                }
                SourceKind::Practitioners | SourceKind::Products => {
                    let cfg = self.tabular(kind).cloned().unwrap_or_default();
                    (
                        location_override.map(Path::to_path_buf).or(cfg.file),
                        cfg.required,
                        cfg.collection,
                        cfg.key_column,
                        cfg.text_columns,
                        Vec::new(),
                        Vec::new(),
                    )
                }
            };

        let required = required.unwrap_or_else(|| kind.required_by_default());

        let location = match location {
            Some(path) => path,
            None if required => {
                return Err(IngestError::Configuration(format!(
                    "no location configured for source '{}' (set it in the config file or pass {})",
                    kind,
                    if kind == SourceKind::Documents {
                        "--directory"
                    } else {
                        "--file"
                    },
                )));
            }
            None => return Ok(None),
        };

        Ok(Some(IngestionSource {
            kind,
            location,
            collection: collection.unwrap_or_else(|| kind.slug().to_string()),
            required,
            key_column,
            text_columns,
            include_globs: include,
            exclude_globs: exclude,
        }))
    }
}

/// Load configuration from a TOML file.
///
/// A missing file yields the built-in defaults so purely flag-driven
/// invocations work without any config on disk.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.api.batch_size == 0 {
        anyhow::bail!("api.batch_size must be > 0");
    }
    if config.api.max_in_flight == 0 {
        anyhow::bail!("api.max_in_flight must be > 0");
    }
    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }
    if config.api.base_url.trim().is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }

    Ok(config)
}
