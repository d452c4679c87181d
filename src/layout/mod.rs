//! Dataset indexing: the directory walk and sidecar metadata resolution.
//!
//! ## Pipeline
//! 1. [`DirectoryWalker`] visits the tree one directory per frame, extending
//!    the [`ConfigChain`] where a directory declares its own layout config,
//!    and emits File and Tag records.
//! 2. [`MetadataResolver`] reads the finished [`FileIndex`] and emits
//!    metadata Entities, Tags and provenance Associations.
//!
//! Both stages write through a [`Store`](crate::store::Store). The
//! `derivatives` directory under a root is never descended into; use
//! [`index_derivatives`] to index each pipeline there as its own root.

mod chain;
mod entity;
mod metadata;
mod validate;
mod walker;

pub use chain::{ConfigChain, EntitySet, LayoutConfig};
pub use entity::{Dtype, Entity, EntitySpec, MatchScope};
pub use metadata::{
    DEFAULT_BATCH_SIZE, EntityRegistry, InvalidSidecarPolicy, MetadataOptions, MetadataResolver,
    ResolveStats, resolve_metadata,
};
pub use validate::{AcceptAll, PatternSet, PatternValidator, Validator};
pub use walker::{DERIVATIVES_DIR, DirectoryWalker, FileIndex};

use crate::error::{IndexError, Result};
use crate::store::Store;
use crate::types::IndexSummary;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reserved per-directory layout config filename.
pub const DEFAULT_CONFIG_FILENAME: &str = "layout_config.json";

/// Options for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Configs active at the root, in order.
    pub layout_configs: Vec<LayoutConfig>,
    pub config_filename: String,
    /// Index every file regardless of validity.
    pub force: bool,
    pub index_metadata: bool,
    pub metadata: MetadataOptions,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            layout_configs: Vec::new(),
            config_filename: DEFAULT_CONFIG_FILENAME.to_string(),
            force: false,
            index_metadata: true,
            metadata: MetadataOptions::default(),
        }
    }
}

/// Index the dataset rooted at `root` into `store`.
pub fn index_layout<S: Store>(
    root: &Path,
    options: &IndexOptions,
    validator: &dyn Validator,
    store: &mut S,
) -> Result<IndexSummary> {
    let root = std::fs::canonicalize(root).map_err(|e| IndexError::io(root, e))?;
    info!(root = %root.display(), "Indexing dataset");

    let chain = ConfigChain::new(options.layout_configs.iter().cloned());
    let index = DirectoryWalker::new(&root, &options.config_filename, validator, &mut *store)
        .run(chain, options.force)?;

    let mut summary = IndexSummary {
        root: root.clone(),
        directories: index.directories,
        files: index.files.len(),
        filename_tags: index.tags,
        ..Default::default()
    };

    if options.index_metadata {
        let stats = resolve_metadata(&index, options.metadata, store)?;
        summary.metadata_tags = stats.metadata_tags;
        summary.metadata_entities = stats.metadata_entities;
        summary.associations = stats.associations;
    }

    info!(
        root = %root.display(),
        files = summary.files,
        filename_tags = summary.filename_tags,
        metadata_tags = summary.metadata_tags,
        associations = summary.associations,
        "Indexing complete"
    );
    Ok(summary)
}

/// Directories directly under `<root>/derivatives`, sorted.
pub fn derivative_roots(root: &Path) -> Result<Vec<PathBuf>> {
    let dir = root.join(DERIVATIVES_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut roots = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| IndexError::io(&dir, e))? {
        let entry = entry.map_err(|e| IndexError::io(&dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            roots.push(path);
        }
    }
    roots.sort();
    Ok(roots)
}

/// Index each pipeline under `<root>/derivatives` as a separate root.
///
/// `validator_for` builds the validator for each derivative root, since
/// path patterns are anchored at the root they apply to.
pub fn index_derivatives<S, V, F>(
    root: &Path,
    options: &IndexOptions,
    validator_for: F,
    store: &mut S,
) -> Result<Vec<IndexSummary>>
where
    S: Store,
    V: Validator,
    F: Fn(&Path) -> Result<V>,
{
    let mut summaries = Vec::new();
    for derivative in derivative_roots(root)? {
        let validator = validator_for(&derivative)?;
        summaries.push(index_layout(&derivative, options, &validator, store)?);
    }
    Ok(summaries)
}
