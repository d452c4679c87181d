//! Record sink used by the indexer.

use crate::error::Result;
use crate::layout::Entity;
use crate::types::{Association, FileRecord, Record, Tag};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Append/commit sink for index records.
///
/// Records passed to `add` are held until `commit`. A commit is a flush
/// boundary only: records committed earlier in a failed run stay committed.
pub trait Store {
    fn add(&mut self, record: Record) -> Result<()>;

    fn add_all(&mut self, records: Vec<Record>) -> Result<()> {
        for record in records {
            self.add(record)?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()>;

    /// Number of records added since the last commit.
    fn pending(&self) -> usize;
}

impl<S: Store + ?Sized> Store for &mut S {
    fn add(&mut self, record: Record) -> Result<()> {
        (**self).add(record)
    }

    fn add_all(&mut self, records: Vec<Record>) -> Result<()> {
        (**self).add_all(records)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn pending(&self) -> usize {
        (**self).pending()
    }
}

/// Store that keeps committed records in memory.
///
/// Applies the same conflict rules as the SQLite session: config entities
/// replace an existing definition, metadata entities and tags keep the first
/// one, identical associations are stored once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pending: Vec<Record>,
    files: Vec<FileRecord>,
    file_paths: HashSet<PathBuf>,
    entities: Vec<Entity>,
    entity_positions: HashMap<String, usize>,
    tags: Vec<Tag>,
    tag_keys: HashSet<(PathBuf, String)>,
    associations: Vec<Association>,
    association_keys: HashSet<Association>,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entity_positions.get(name).map(|&i| &self.entities[i])
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Committed tags for one file.
    pub fn tags_for(&self, path: impl Into<PathBuf>) -> Vec<&Tag> {
        let path = path.into();
        self.tags.iter().filter(|t| t.file_path == path).collect()
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    /// Number of commits that flushed at least one record.
    pub fn commits(&self) -> usize {
        self.commits
    }

    fn apply(&mut self, record: Record) {
        match record {
            Record::File(file) => {
                if self.file_paths.insert(file.path.clone()) {
                    self.files.push(file);
                }
            }
            Record::Entity(entity) => match self.entity_positions.get(&entity.name) {
                Some(&idx) if !entity.is_metadata => self.entities[idx] = entity,
                Some(_) => {}
                None => {
                    self.entity_positions
                        .insert(entity.name.clone(), self.entities.len());
                    self.entities.push(entity);
                }
            },
            Record::Tag(tag) => {
                if self
                    .tag_keys
                    .insert((tag.file_path.clone(), tag.entity.clone()))
                {
                    self.tags.push(tag);
                }
            }
            Record::Association(assoc) => {
                if self.association_keys.insert(assoc.clone()) {
                    self.associations.push(assoc);
                }
            }
        }
    }
}

impl Store for MemoryStore {
    fn add(&mut self, record: Record) -> Result<()> {
        self.pending.push(record);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        for record in std::mem::take(&mut self.pending) {
            self.apply(record);
        }
        self.commits += 1;
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssociationKind;
    use serde_json::json;

    #[test]
    fn records_are_invisible_until_commit() {
        let mut store = MemoryStore::new();
        store
            .add(Record::File(FileRecord::new("/d/a.txt")))
            .unwrap();
        assert_eq!(store.pending(), 1);
        assert!(store.files().is_empty());

        store.commit().unwrap();
        assert_eq!(store.pending(), 0);
        assert_eq!(store.files().len(), 1);
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn empty_commit_is_not_counted() {
        let mut store = MemoryStore::new();
        store.commit().unwrap();
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn conflict_rules() {
        let mut store = MemoryStore::new();
        store
            .add_all(vec![
                Record::Entity(Entity::metadata("EchoTime")),
                Record::Entity(Entity::metadata("EchoTime")),
                Record::Tag(Tag::new("/d/a", "EchoTime", json!(1))),
                Record::Tag(Tag::new("/d/a", "EchoTime", json!(2))),
                Record::Association(Association::new("/d/a", "/d/b", AssociationKind::Child)),
                Record::Association(Association::new("/d/a", "/d/b", AssociationKind::Child)),
                Record::Association(Association::new("/d/a", "/d/b", AssociationKind::Metadata)),
            ])
            .unwrap();
        store.commit().unwrap();

        assert_eq!(store.entities().len(), 1);
        assert_eq!(store.tags().len(), 1);
        assert_eq!(store.tags()[0].value, json!(1));
        assert_eq!(store.associations().len(), 2);
    }
}
