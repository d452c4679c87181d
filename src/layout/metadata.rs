//! Sidecar metadata resolution.
//!
//! Runs after the walk. For every non-JSON file it climbs the directory
//! ancestry collecting JSON sidecars (and same-type files) whose entities are
//! a compatible subset of the file's own, merges the sidecar payloads with
//! closer directories winning key by key, and records the provenance graph.
//!
//! Entities created for new metadata keys live in an [`EntityRegistry`] owned
//! by the pass. Per-file processing receives it by `&mut`, which keeps a
//! single writer for the first-definition-wins rule.

use super::chain::EntitySet;
use super::entity::Entity;
use super::walker::FileIndex;
use crate::error::{IndexError, Result};
use crate::store::Store;
use crate::types::{
    Association, AssociationKind, EXTENSION_ENTITY, EntityValues, FileRecord, Record,
    SUFFIX_ENTITY, Tag,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Pending-record count that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// What to do with a sidecar that is not a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidSidecarPolicy {
    /// Abort the run.
    #[default]
    Fail,
    /// Log a warning and ignore the sidecar.
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataOptions {
    pub batch_size: usize,
    pub on_invalid_sidecar: InvalidSidecarPolicy,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            on_invalid_sidecar: InvalidSidecarPolicy::Fail,
        }
    }
}

/// Counts produced by one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub files_with_metadata: usize,
    pub metadata_tags: usize,
    pub metadata_entities: usize,
    pub associations: usize,
}

/// Known entity names for the run, first definition wins.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Entity>,
}

impl EntityRegistry {
    pub fn from_set(set: &EntitySet) -> Self {
        Self {
            entities: set.iter().map(|e| (e.name.clone(), e.clone())).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Register a metadata entity for `name` unless one is already known.
    /// Returns the entity only when it was created by this call.
    pub fn ensure_metadata(&mut self, name: &str) -> Option<Entity> {
        if self.entities.contains_key(name) {
            return None;
        }
        let entity = Entity::metadata(name);
        self.entities.insert(name.to_string(), entity.clone());
        Some(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// A file as seen from the lookup table.
#[derive(Debug)]
struct Candidate<'a> {
    /// Entities other than suffix and extension.
    entities: EntityValues,
    /// Parsed object, only for JSON sidecars.
    payload: Option<Map<String, Value>>,
    path: &'a Path,
}

/// (extension, suffix) -> directory -> files directly in that directory.
type Lookup<'a> = HashMap<(String, String), HashMap<&'a Path, Vec<Candidate<'a>>>>;

/// Render an entity value as a lookup key component.
fn key_part(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim_start_matches('.').to_string(),
        other => other.to_string(),
    }
}

/// Split a file's entities into (rest, suffix, extension).
fn split_entities(file: &FileRecord) -> (EntityValues, Option<String>, Option<String>) {
    let rest = file
        .entities
        .iter()
        .filter(|(k, _)| k.as_str() != SUFFIX_ENTITY && k.as_str() != EXTENSION_ENTITY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let suffix = file.entities.get(SUFFIX_ENTITY).map(key_part);
    let extension = file.entities.get(EXTENSION_ENTITY).map(key_part);
    (rest, suffix, extension)
}

/// Every key of `candidate` is present in `file` with an equal value.
fn is_compatible(candidate: &EntityValues, file: &EntityValues) -> bool {
    candidate.iter().all(|(k, v)| file.get(k) == Some(v))
}

/// Resolves sidecar metadata for a completed file index.
pub struct MetadataResolver<'a, S: Store> {
    options: MetadataOptions,
    store: &'a mut S,
    registry: EntityRegistry,
    emitted: HashSet<Association>,
    stats: ResolveStats,
}

impl<'a, S: Store> MetadataResolver<'a, S> {
    pub fn new(index: &FileIndex, options: MetadataOptions, store: &'a mut S) -> Self {
        Self {
            options,
            store,
            registry: EntityRegistry::from_set(&index.entities),
            emitted: HashSet::new(),
            stats: ResolveStats::default(),
        }
    }

    pub fn run(mut self, index: &FileIndex) -> Result<ResolveStats> {
        let lookup = self.build_lookup(index)?;

        for file in index.files.iter().filter(|f| !f.is_json()) {
            let added = resolve_file(
                file,
                &lookup,
                &mut self.registry,
                &mut self.emitted,
                &mut self.stats,
            )?;
            self.store.add_all(added)?;

            if self.store.pending() >= self.options.batch_size {
                self.store.commit()?;
            }
        }

        self.store.commit()?;
        Ok(self.stats)
    }

    fn build_lookup<'i>(&self, index: &'i FileIndex) -> Result<Lookup<'i>> {
        let mut lookup: Lookup<'i> = HashMap::new();

        for file in &index.files {
            let (entities, suffix, extension) = split_entities(file);
            let (Some(suffix), Some(extension)) = (suffix, extension) else {
                continue;
            };

            let payload = if extension == "json" {
                match self.load_sidecar(&file.path)? {
                    Some(payload) => Some(payload),
                    None => continue,
                }
            } else {
                None
            };

            lookup
                .entry((extension, suffix))
                .or_default()
                .entry(file.dirname.as_path())
                .or_default()
                .push(Candidate {
                    entities,
                    payload,
                    path: &file.path,
                });
        }

        Ok(lookup)
    }

    /// Parse a sidecar. `None` means it was skipped under the warn policy.
    fn load_sidecar(&self, path: &Path) -> Result<Option<Map<String, Value>>> {
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        let parsed = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(IndexError::sidecar(path, "top-level value is not an object")),
            Err(e) => Err(IndexError::sidecar(path, e.to_string())),
        };

        match (parsed, self.options.on_invalid_sidecar) {
            (Ok(map), _) => Ok(Some(map)),
            (Err(e), InvalidSidecarPolicy::Warn) => {
                warn!(error = %e, "Ignoring invalid sidecar");
                Ok(None)
            }
            (Err(e), InvalidSidecarPolicy::Fail) => Err(e),
        }
    }
}

/// Records produced for one file.
fn resolve_file(
    file: &FileRecord,
    lookup: &Lookup<'_>,
    registry: &mut EntityRegistry,
    emitted: &mut HashSet<Association>,
    stats: &mut ResolveStats,
) -> Result<Vec<Record>> {
    let (entities, suffix, extension) = split_entities(file);
    let (Some(suffix), Some(extension)) = (suffix, extension) else {
        return Ok(Vec::new());
    };

    let sidecars = lookup.get(&("json".to_string(), suffix.clone()));
    let siblings = lookup.get(&(extension, suffix));

    let mut payloads: Vec<(&Map<String, Value>, &Path)> = Vec::new();
    let mut ancestors: Vec<&Path> = Vec::new();

    let mut dir = Some(file.dirname.as_path());
    while let Some(current) = dir {
        if let Some(found) = sidecars.and_then(|by_dir| by_dir.get(current)) {
            for candidate in found {
                if let Some(payload) = &candidate.payload
                    && is_compatible(&candidate.entities, &entities)
                {
                    payloads.push((payload, candidate.path));
                }
            }
        }

        if let Some(found) = siblings.and_then(|by_dir| by_dir.get(current)) {
            for candidate in found {
                if is_compatible(&candidate.entities, &entities) {
                    ancestors.push(candidate.path);
                }
            }
        }

        dir = current.parent();
    }

    if payloads.is_empty() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    let mut push_edge = |src: &Path, dst: &Path, kind: AssociationKind, records: &mut Vec<Record>| {
        let assoc = Association::new(src, dst, kind);
        if emitted.insert(assoc.clone()) {
            stats.associations += 1;
            records.push(Record::Association(assoc));
        }
    };

    // The canonical metadata edge points at the farthest matching sidecar,
    // even though the closest one dominates the merged values.
    let (_, farthest) = payloads[payloads.len() - 1];
    push_edge(farthest, file.path.as_path(), AssociationKind::Metadata, &mut records);
    push_edge(file.path.as_path(), farthest, AssociationKind::Metadata, &mut records);

    let mut metadata = Map::new();
    for (payload, _) in payloads.iter().rev() {
        for (key, value) in payload.iter() {
            metadata.insert(key.clone(), value.clone());
        }
    }

    let sidecar_paths: Vec<&Path> = payloads.iter().map(|(_, path)| *path).collect();
    for chain in [&sidecar_paths, &ancestors] {
        for pair in chain.windows(2) {
            push_edge(pair[0], pair[1], AssociationKind::Child, &mut records);
            push_edge(pair[1], pair[0], AssociationKind::Parent, &mut records);
        }
    }

    for (key, value) in metadata {
        if let Some(entity) = registry.ensure_metadata(&key) {
            stats.metadata_entities += 1;
            records.push(Record::Entity(entity));
        }
        if file.entities.contains_key(&key) {
            debug!(path = %file.path.display(), key = %key, "Filename tag shadows metadata key");
            continue;
        }
        stats.metadata_tags += 1;
        records.push(Record::Tag(Tag::new(&file.path, key, value)));
    }

    stats.files_with_metadata += 1;
    Ok(records)
}

/// Resolve metadata for `index` into `store`.
pub fn resolve_metadata<S: Store>(
    index: &FileIndex,
    options: MetadataOptions,
    store: &mut S,
) -> Result<ResolveStats> {
    MetadataResolver::new(index, options, store).run(index)
}
