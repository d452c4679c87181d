//! Layout configs and the directory-scoped config chain.
//!
//! A layout config declares the entities recognized in a subtree. Configs
//! found while descending are appended to the chain for that subtree only;
//! the active entity set at a directory is the ordered union of the chain.

use super::entity::{Entity, EntitySpec};
use crate::error::{IndexError, Result};
use crate::types::{EntityValues, FileRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Built-in layout config for BIDS-style datasets.
const BIDS_CONFIG: &str = include_str!("../../config/bids.yaml");

/// On-disk form of a layout config (YAML or JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayoutConfigFile {
    name: String,
    #[serde(default)]
    entities: Vec<EntitySpec>,
}

/// A named, ordered set of entities valid within a subtree.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub name: String,
    pub entities: Vec<Entity>,
    /// File the config was loaded from, if any.
    pub path: Option<PathBuf>,
}

impl LayoutConfig {
    /// Load a layout config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        let mut config = Self::parse(&content, path)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config text. `origin` is only used in error messages.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        // serde_yaml also accepts JSON documents
        let file: LayoutConfigFile =
            serde_yaml::from_str(content).map_err(|e| IndexError::config(origin, e.to_string()))?;

        let entities = file
            .entities
            .into_iter()
            .map(|spec| Entity::from_spec(spec, Some(&file.name)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: file.name,
            entities,
            path: None,
        })
    }

    /// Look up a config compiled into the binary.
    pub fn builtin(name: &str) -> Option<Result<Self>> {
        match name {
            "bids" => Some(Self::parse(BIDS_CONFIG, Path::new("<builtin:bids>"))),
            _ => None,
        }
    }

    /// Resolve a reference that is either a builtin name or a file path.
    pub fn resolve(reference: &str) -> Result<Self> {
        match Self::builtin(reference) {
            Some(config) => config,
            None => Self::load(reference),
        }
    }
}

/// Ordered union of entities with last-writer-wins on name collisions.
///
/// A redefinition keeps the position of the first definition, so iteration
/// order is the order names were first introduced.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    entities: Vec<Entity>,
    positions: HashMap<String, usize>,
}

impl EntitySet {
    pub fn insert(&mut self, entity: Entity) {
        match self.positions.get(&entity.name) {
            Some(&idx) => self.entities[idx] = entity,
            None => {
                self.positions.insert(entity.name.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.positions.get(name).map(|&idx| &self.entities[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Extract entity values for `file`.
    ///
    /// Stops at the first mandatory entity that does not match; values
    /// extracted before that point are kept.
    pub fn extract(&self, file: &FileRecord) -> Result<EntityValues> {
        let mut values = EntityValues::new();
        for entity in &self.entities {
            match entity.match_file(file)? {
                Some(value) => {
                    values.insert(entity.name.clone(), value);
                }
                None if entity.mandatory => break,
                None => {}
            }
        }
        Ok(values)
    }
}

/// Layout configs active at a directory, root first.
///
/// Cloning is shallow: configs are shared, the list is not.
#[derive(Debug, Clone, Default)]
pub struct ConfigChain {
    configs: Vec<Arc<LayoutConfig>>,
}

impl ConfigChain {
    pub fn new(configs: impl IntoIterator<Item = LayoutConfig>) -> Self {
        Self {
            configs: configs.into_iter().map(Arc::new).collect(),
        }
    }

    /// A copy of this chain with `config` appended.
    pub fn with(&self, config: LayoutConfig) -> Self {
        let mut chain = self.clone();
        chain.configs.push(Arc::new(config));
        chain
    }

    pub fn configs(&self) -> impl Iterator<Item = &LayoutConfig> {
        self.configs.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Merge every config's entities in chain order.
    pub fn entities(&self) -> EntitySet {
        let mut set = EntitySet::default();
        for config in &self.configs {
            for entity in &config.entities {
                set.insert(entity.clone());
            }
        }
        set
    }
}
