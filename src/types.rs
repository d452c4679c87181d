//! Core record types produced by an indexing run.

use crate::layout::Entity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Entity name to value, in extraction order.
pub type EntityValues = Map<String, Value>;

/// Entity holding the file suffix (the label before the extension).
pub const SUFFIX_ENTITY: &str = "suffix";

/// Entity holding the file extension.
pub const EXTENSION_ENTITY: &str = "extension";

/// A file that passed the walk's validity checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub dirname: PathBuf,
    pub filename: String,
    /// Filename-derived entity values. Metadata tags are not folded back in.
    pub entities: EntityValues,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dirname = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            dirname,
            filename,
            entities: Map::new(),
        }
    }

    /// Path as a lossy UTF-8 string, the form patterns are matched against.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Whether this file is a JSON sidecar.
    pub fn is_json(&self) -> bool {
        self.filename.ends_with(".json")
    }
}

/// A concrete (file, entity, value) assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub file_path: PathBuf,
    pub entity: String,
    pub value: Value,
}

impl Tag {
    pub fn new(file_path: impl Into<PathBuf>, entity: impl Into<String>, value: Value) -> Self {
        Self {
            file_path: file_path.into(),
            entity: entity.into(),
            value,
        }
    }
}

/// Kind of provenance edge between two files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssociationKind {
    Metadata,
    Parent,
    Child,
}

impl AssociationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::Metadata => "Metadata",
            AssociationKind::Parent => "Parent",
            AssociationKind::Child => "Child",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Metadata" => Some(AssociationKind::Metadata),
            "Parent" => Some(AssociationKind::Parent),
            "Child" => Some(AssociationKind::Child),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed provenance edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Association {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub kind: AssociationKind,
}

impl Association {
    pub fn new(src: impl Into<PathBuf>, dst: impl Into<PathBuf>, kind: AssociationKind) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind,
        }
    }
}

/// Anything the indexer hands to a store.
#[derive(Debug, Clone)]
pub enum Record {
    File(FileRecord),
    Entity(Entity),
    Tag(Tag),
    Association(Association),
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub root: PathBuf,
    pub directories: usize,
    pub files: usize,
    pub filename_tags: usize,
    pub metadata_tags: usize,
    pub metadata_entities: usize,
    pub associations: usize,
}

impl IndexSummary {
    /// Fold another root's counts into this one, keeping this root.
    pub fn absorb(&mut self, other: &IndexSummary) {
        self.directories += other.directories;
        self.files += other.files;
        self.filename_tags += other.filename_tags;
        self.metadata_tags += other.metadata_tags;
        self.metadata_entities += other.metadata_entities;
        self.associations += other.associations;
    }
}
