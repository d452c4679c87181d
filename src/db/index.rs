//! Read helpers over the indexed tables.

use super::Database;
use crate::types::{Association, AssociationKind, EntityValues, FileRecord, Tag};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// An `entities` row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub name: String,
    pub pattern: Option<String>,
    pub mandatory: bool,
    pub dtype: String,
    pub scope: String,
    pub is_metadata: bool,
    pub config: Option<String>,
}

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files: usize,
    pub entities: usize,
    pub metadata_entities: usize,
    pub tags: usize,
    pub associations: usize,
}

fn parse_value(raw: String) -> Value {
    // Values are written as JSON text; anything else is kept as a string.
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn parse_entity_row(row: &Row) -> rusqlite::Result<EntityRow> {
    Ok(EntityRow {
        name: row.get("name")?,
        pattern: row.get("pattern")?,
        mandatory: row.get("mandatory")?,
        dtype: row.get("dtype")?,
        scope: row.get("scope")?,
        is_metadata: row.get("is_metadata")?,
        config: row.get("config")?,
    })
}

fn parse_tag_row(row: &Row) -> rusqlite::Result<Tag> {
    let file_path: String = row.get(0)?;
    let value: String = row.get(2)?;
    Ok(Tag {
        file_path: PathBuf::from(file_path),
        entity: row.get(1)?,
        value: parse_value(value),
    })
}

fn filename_entities(conn: &Connection, path: &str) -> rusqlite::Result<EntityValues> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.entity_name, t.value
         FROM tags t JOIN entities e ON e.name = t.entity_name
         WHERE t.file_path = ?1 AND e.is_metadata = 0
         ORDER BY t.rowid",
    )?;
    let rows = stmt.query_map(params![path], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entities = EntityValues::new();
    for row in rows {
        let (name, value) = row?;
        entities.insert(name, parse_value(value));
    }
    Ok(entities)
}

impl Database {
    /// All files ordered by path, with their filename-derived entities.
    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT path, dirname, filename FROM files ORDER BY path")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut files = Vec::with_capacity(rows.len());
            for (path, dirname, filename) in rows {
                let entities = filename_entities(conn, &path)?;
                files.push(FileRecord {
                    path: PathBuf::from(path),
                    dirname: PathBuf::from(dirname),
                    filename,
                    entities,
                });
            }
            Ok(files)
        })
    }

    /// Look up one file by absolute path.
    pub fn get_file(&self, path: &Path) -> Result<Option<FileRecord>> {
        let key = path.to_string_lossy().into_owned();
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT path, dirname, filename FROM files WHERE path = ?1")?;
            let mut rows = stmt.query(params![key])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            let path: String = row.get(0)?;
            let dirname: String = row.get(1)?;
            let filename: String = row.get(2)?;
            let entities = filename_entities(conn, &path)?;
            Ok(Some(FileRecord {
                path: PathBuf::from(path),
                dirname: PathBuf::from(dirname),
                filename,
                entities,
            }))
        })
    }

    /// All entities ordered by name.
    pub fn list_entities(&self) -> Result<Vec<EntityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, pattern, mandatory, dtype, scope, is_metadata, config
                 FROM entities ORDER BY name",
            )?;
            let rows = stmt
                .query_map([], parse_entity_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Every tag of one file (filename and metadata), ordered by entity name.
    pub fn get_tags(&self, path: &Path) -> Result<Vec<Tag>> {
        let key = path.to_string_lossy().into_owned();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_path, entity_name, value FROM tags
                 WHERE file_path = ?1 ORDER BY entity_name",
            )?;
            let rows = stmt
                .query_map(params![key], parse_tag_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Every association ordered by (src, dst, kind).
    pub fn list_associations(&self) -> Result<Vec<Association>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT src, dst, kind FROM associations ORDER BY src, dst, kind")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(src, dst, kind)| {
                    let kind = AssociationKind::parse(&kind)
                        .ok_or_else(|| anyhow!("unknown association kind '{kind}'"))?;
                    Ok(Association::new(src, dst, kind))
                })
                .collect()
        })
    }

    /// Row counts for a summary.
    pub fn stats(&self) -> Result<IndexStats> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> rusqlite::Result<usize> {
                conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                    .map(|n| n as usize)
            };
            Ok(IndexStats {
                files: count("SELECT COUNT(*) FROM files")?,
                entities: count("SELECT COUNT(*) FROM entities")?,
                metadata_entities: count("SELECT COUNT(*) FROM entities WHERE is_metadata = 1")?,
                tags: count("SELECT COUNT(*) FROM tags")?,
                associations: count("SELECT COUNT(*) FROM associations")?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Entity;
    use crate::store::Store;
    use crate::types::Record;
    use serde_json::json;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        let mut session = db.session();
        let mut file = FileRecord::new("/data/sub-01/sub-01_T1w.nii.gz");
        file.entities.insert("subject".into(), json!("01"));
        let sidecar = FileRecord::new("/data/T1w.json");

        let mut subject = Entity::metadata("subject");
        subject.is_metadata = false;
        let echo = Entity::metadata("EchoTime");
        session
            .add_all(vec![
                Record::File(file.clone()),
                Record::File(sidecar.clone()),
                Record::Entity(subject),
                Record::Entity(echo),
                Record::Tag(Tag::new(&file.path, "subject", json!("01"))),
                Record::Tag(Tag::new(&file.path, "EchoTime", json!(0.03))),
                Record::Association(Association::new(
                    &file.path,
                    &sidecar.path,
                    AssociationKind::Metadata,
                )),
            ])
            .unwrap();
        session.commit().unwrap();
        db
    }

    #[test]
    fn list_files_carries_only_filename_entities() {
        let db = seeded();
        let files = db.list_files().unwrap();
        assert_eq!(files.len(), 2);

        let bold = &files[0];
        assert_eq!(bold.filename, "sub-01_T1w.nii.gz");
        assert_eq!(bold.entities.get("subject"), Some(&json!("01")));
        assert!(!bold.entities.contains_key("EchoTime"));
    }

    #[test]
    fn get_tags_returns_typed_values() {
        let db = seeded();
        let tags = db
            .get_tags(Path::new("/data/sub-01/sub-01_T1w.nii.gz"))
            .unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.entity.as_str()).collect();
        assert_eq!(names, vec!["EchoTime", "subject"]);
        assert_eq!(tags[0].value, json!(0.03));
    }

    #[test]
    fn get_file_misses_unknown_path() {
        let db = seeded();
        assert!(db.get_file(Path::new("/data/nope.nii")).unwrap().is_none());
        assert!(db.get_file(Path::new("/data/T1w.json")).unwrap().is_some());
    }

    #[test]
    fn stats_count_rows() {
        let db = seeded();
        let stats = db.stats().unwrap();
        assert_eq!(
            stats,
            IndexStats {
                files: 2,
                entities: 2,
                metadata_entities: 1,
                tags: 2,
                associations: 1,
            }
        );
        assert_eq!(db.list_associations().unwrap()[0].kind, AssociationKind::Metadata);
    }
}
