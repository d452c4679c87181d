//! Recursive directory walk that builds the raw file/tag index.
//!
//! Each frame visits exactly one directory: it extends the config chain if
//! the directory declares a layout config, indexes the directory's files,
//! commits them, and then recurses into subdirectories that survive the
//! derivatives, force-index and validity checks. Children receive a copy of
//! the chain, so a nested config never leaks into sibling subtrees.

use super::chain::{ConfigChain, EntitySet, LayoutConfig};
use super::validate::Validator;
use crate::error::{IndexError, Result};
use crate::store::Store;
use crate::types::{FileRecord, Record, Tag};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory that is always indexed as a separate root.
pub const DERIVATIVES_DIR: &str = "derivatives";

/// Files collected by a walk, in visit order.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    pub files: Vec<FileRecord>,
    /// Every entity declared by a config encountered during the walk.
    pub entities: EntitySet,
    pub directories: usize,
    pub tags: usize,
}

struct DirEntries {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

/// Read a directory's immediate children, sorted by name.
///
/// Symlinks are followed; a broken link is an error.
fn read_entries(dir: &Path) -> Result<DirEntries> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| IndexError::io(dir, e))? {
        let entry = entry.map_err(|e| IndexError::io(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();

    let mut entries = DirEntries {
        files: Vec::new(),
        dirs: Vec::new(),
    };
    for path in paths {
        let meta = fs::metadata(&path).map_err(|e| IndexError::io(&path, e))?;
        if meta.is_dir() {
            entries.dirs.push(path);
        } else {
            entries.files.push(path);
        }
    }
    Ok(entries)
}

/// Walks one dataset root into a store.
pub struct DirectoryWalker<'a, S: Store> {
    root: PathBuf,
    derivatives: PathBuf,
    config_filename: &'a str,
    validator: &'a dyn Validator,
    store: &'a mut S,
    index: FileIndex,
}

impl<'a, S: Store> DirectoryWalker<'a, S> {
    pub fn new(
        root: &Path,
        config_filename: &'a str,
        validator: &'a dyn Validator,
        store: &'a mut S,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            derivatives: root.join(DERIVATIVES_DIR),
            config_filename,
            validator,
            store,
            index: FileIndex::default(),
        }
    }

    /// Walk from the root with `chain` as the inherited configs.
    ///
    /// `force` bypasses file validity checks for the whole tree.
    pub fn run(mut self, chain: ConfigChain, force: bool) -> Result<FileIndex> {
        for config in chain.configs() {
            self.register_config(config)?;
        }
        let root = self.root.clone();
        self.visit(&root, &chain, force)?;
        Ok(self.index)
    }

    fn register_config(&mut self, config: &LayoutConfig) -> Result<()> {
        for entity in &config.entities {
            self.index.entities.insert(entity.clone());
            self.store.add(Record::Entity(entity.clone()))?;
        }
        Ok(())
    }

    fn visit(&mut self, dir: &Path, inherited: &ConfigChain, forced: bool) -> Result<()> {
        let entries = read_entries(dir)?;
        self.index.directories += 1;

        let config_path = dir.join(self.config_filename);
        let chain = if entries.files.contains(&config_path) {
            let config = LayoutConfig::load(&config_path)?;
            debug!(dir = %dir.display(), config = %config.name, "Loaded directory config");
            self.register_config(&config)?;
            inherited.with(config)
        } else {
            inherited.clone()
        };
        let entities = chain.entities();

        for path in entries.files.iter().filter(|p| **p != config_path) {
            let bypass = forced || self.validator.matches_force_index(path);
            if !bypass && !self.validator.is_valid_file(path) {
                debug!(path = %path.display(), "Skipping invalid file");
                continue;
            }
            self.index_file(path, &entities)?;
        }

        self.store.commit()?;

        for subdir in &entries.dirs {
            // Derivatives are indexed as separate roots by the caller.
            if subdir.starts_with(&self.derivatives) {
                debug!(dir = %subdir.display(), "Skipping derivatives directory");
                continue;
            }

            let child_forced = if self.validator.matches_force_index(subdir) {
                true
            } else {
                // Force-index patterns may match anywhere below an invalid
                // directory, so pruning is only safe when none exist.
                if !self.validator.is_valid_dir(subdir)
                    && !self.validator.has_force_index_patterns()
                {
                    debug!(dir = %subdir.display(), "Skipping invalid directory");
                    continue;
                }
                forced
            };

            self.visit(subdir, &chain, child_forced)?;
        }

        Ok(())
    }

    fn index_file(&mut self, path: &Path, entities: &EntitySet) -> Result<()> {
        let mut file = FileRecord::new(path);
        file.entities = entities.extract(&file)?;

        self.store.add(Record::File(file.clone()))?;
        for (name, value) in &file.entities {
            self.store
                .add(Record::Tag(Tag::new(&file.path, name, value.clone())))?;
            self.index.tags += 1;
        }

        self.index.files.push(file);
        Ok(())
    }
}
