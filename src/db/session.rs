//! Buffered write session implementing [`Store`] over SQLite.

use super::{Database, now_ms};
use crate::error::Result;
use crate::layout::Entity;
use crate::store::Store;
use crate::types::{Association, FileRecord, Record, Tag};
use rusqlite::{Transaction, params};
use tracing::debug;

/// Buffers records and writes them in one transaction per commit.
pub struct Session {
    db: Database,
    pending: Vec<Record>,
}

impl Session {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            pending: Vec::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl Store for Session {
    fn add(&mut self, record: Record) -> Result<()> {
        self.pending.push(record);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let records = std::mem::take(&mut self.pending);
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        let indexed_at = now_ms();
        for record in &records {
            write_record(&tx, record, indexed_at)?;
        }
        tx.commit()?;

        debug!(records = records.len(), "Committed index records");
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn write_record(tx: &Transaction<'_>, record: &Record, indexed_at: i64) -> rusqlite::Result<()> {
    match record {
        Record::File(file) => insert_file(tx, file, indexed_at),
        Record::Entity(entity) => insert_entity(tx, entity),
        Record::Tag(tag) => insert_tag(tx, tag),
        Record::Association(assoc) => insert_association(tx, assoc),
    }
}

fn insert_file(tx: &Transaction<'_>, file: &FileRecord, indexed_at: i64) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO files (path, dirname, filename, indexed_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(path) DO NOTHING",
        params![
            file.path.to_string_lossy(),
            file.dirname.to_string_lossy(),
            file.filename,
            indexed_at
        ],
    )?;
    Ok(())
}

/// Config entities replace an existing definition; metadata entities never do.
fn insert_entity(tx: &Transaction<'_>, entity: &Entity) -> rusqlite::Result<()> {
    let sql = if entity.is_metadata {
        "INSERT INTO entities (name, pattern, mandatory, dtype, scope, is_metadata, config)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(name) DO NOTHING"
    } else {
        "INSERT INTO entities (name, pattern, mandatory, dtype, scope, is_metadata, config)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(name) DO UPDATE SET
             pattern = excluded.pattern,
             mandatory = excluded.mandatory,
             dtype = excluded.dtype,
             scope = excluded.scope,
             is_metadata = excluded.is_metadata,
             config = excluded.config"
    };
    tx.execute(
        sql,
        params![
            entity.name,
            entity.pattern,
            entity.mandatory,
            entity.dtype.as_str(),
            entity.scope.as_str(),
            entity.is_metadata,
            entity.config
        ],
    )?;
    Ok(())
}

fn insert_tag(tx: &Transaction<'_>, tag: &Tag) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO tags (file_path, entity_name, value)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(file_path, entity_name) DO NOTHING",
        params![
            tag.file_path.to_string_lossy(),
            tag.entity,
            tag.value.to_string()
        ],
    )?;
    Ok(())
}

fn insert_association(tx: &Transaction<'_>, assoc: &Association) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO associations (src, dst, kind)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(src, dst, kind) DO NOTHING",
        params![
            assoc.src.to_string_lossy(),
            assoc.dst.to_string_lossy(),
            assoc.kind.as_str()
        ],
    )?;
    Ok(())
}
