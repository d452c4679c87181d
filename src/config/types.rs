//! Application configuration types.

use crate::layout::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONFIG_FILENAME, IndexOptions, InvalidSidecarPolicy, LayoutConfig,
    MetadataOptions, PatternValidator,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A path pattern used by ignore and force-index lists.
///
/// A plain string is a path relative to the dataset root. A `{ regex: ... }`
/// mapping is searched in the root-relative path (`/sub-01/anat/...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathPattern {
    Path(PathBuf),
    Regex { regex: String },
}

impl PathPattern {
    /// Parse a CLI argument: `re:<pattern>` is a regex, anything else a path.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix("re:") {
            Some(regex) => PathPattern::Regex {
                regex: regex.to_string(),
            },
            None => PathPattern::Path(PathBuf::from(s)),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Where the index is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Directory walk settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Reserved filename of per-directory layout configs.
    #[serde(default = "default_config_filename")]
    pub config_filename: String,

    /// Layout configs active at the root: builtin names or file paths.
    #[serde(default = "default_layout_configs")]
    pub layout_configs: Vec<String>,

    /// Paths never indexed unless force-indexed.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<PathPattern>,

    /// Paths indexed regardless of validity.
    #[serde(default)]
    pub force_index: Vec<PathPattern>,

    /// Also index each `derivatives/*` directory as its own root.
    #[serde(default)]
    pub derivatives: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            config_filename: default_config_filename(),
            layout_configs: default_layout_configs(),
            ignore: default_ignore(),
            force_index: Vec::new(),
            derivatives: false,
        }
    }
}

/// Sidecar resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pending records that trigger a flush during resolution.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub on_invalid_sidecar: InvalidSidecarPolicy,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_batch_size(),
            on_invalid_sidecar: InvalidSidecarPolicy::Fail,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("entity-index.db")
}

fn default_config_filename() -> String {
    DEFAULT_CONFIG_FILENAME.to_string()
}

fn default_layout_configs() -> Vec<String> {
    vec!["bids".to_string()]
}

fn default_ignore() -> Vec<PathPattern> {
    let mut ignore: Vec<PathPattern> = ["code", "stimuli", "sourcedata", "models"]
        .into_iter()
        .map(|p| PathPattern::Path(PathBuf::from(p)))
        .collect();
    ignore.push(PathPattern::Regex {
        regex: r"/\.".to_string(),
    });
    ignore
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        Ok(config.unwrap_or_default())
    }

    /// Build run options, resolving every configured layout config.
    pub fn index_options(&self) -> Result<IndexOptions> {
        let layout_configs = self
            .index
            .layout_configs
            .iter()
            .map(|reference| {
                LayoutConfig::resolve(reference)
                    .with_context(|| format!("loading layout config '{reference}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(IndexOptions {
            layout_configs,
            config_filename: self.index.config_filename.clone(),
            force: false,
            index_metadata: self.metadata.enabled,
            metadata: MetadataOptions {
                batch_size: self.metadata.batch_size.max(1),
                on_invalid_sidecar: self.metadata.on_invalid_sidecar,
            },
        })
    }

    /// Validator anchored at `root` using the ignore and force-index lists.
    pub fn validator(&self, root: &Path) -> Result<PatternValidator> {
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("resolving dataset root {}", root.display()))?;
        Ok(PatternValidator::new(
            &root,
            &self.index.ignore,
            &self.index.force_index,
        )?)
    }
}
