//! Structured snapshots of an index database.
//!
//! A snapshot is a JSON document holding every exported table as an array of
//! row objects, ordered deterministically so that two indexes of the same
//! tree produce identical `tables`.

use crate::db::Database;
use crate::db::export::ExportOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Schema version of the current database.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Export format version (semver).
pub const EXPORT_VERSION: &str = "1.0.0";

/// A structured export snapshot of an index database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: i32,

    /// Export format version (semver)
    pub export_version: String,

    /// ISO 8601 timestamp of export
    pub exported_at: String,

    /// Tool name and version that created this export
    pub exported_by: String,

    /// Table data, keyed by table name.
    pub tables: BTreeMap<String, Vec<Value>>,
}

impl Snapshot {
    /// Create a new empty snapshot with current metadata.
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            export_version: EXPORT_VERSION.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            exported_by: format!("entity-index v{}", env!("CARGO_PKG_VERSION")),
            tables: BTreeMap::new(),
        }
    }

    /// Snapshot the tables of `db` selected by `options`.
    pub fn from_database(db: &Database, options: &ExportOptions) -> anyhow::Result<Self> {
        let mut snapshot = Self::new();
        snapshot.tables = db.export_tables(options)?;
        Ok(snapshot)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a snapshot from a file (supports both plain JSON and gzip).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.starts_with(&[0x1f, 0x8b]) {
            let decoder = flate2::read::GzDecoder::new(bytes.as_slice());
            Ok(serde_json::from_reader(decoder)?)
        } else {
            Ok(Self::from_json(std::str::from_utf8(&bytes)?)?)
        }
    }

    /// Serialize to JSON with pretty formatting.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON to `writer`, gzip-compressed when `gzip` is set.
    pub fn write_to<W: Write>(&self, writer: W, gzip: bool) -> anyhow::Result<()> {
        let json = self.to_json_pretty()?;
        if gzip {
            let mut encoder = flate2::write::GzEncoder::new(writer, flate2::Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?;
        } else {
            let mut writer = writer;
            writer.write_all(json.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&Vec<Value>> {
        self.tables.get(name)
    }

    /// Check if this snapshot's schema is compatible with the current version.
    pub fn is_schema_compatible(&self) -> bool {
        self.schema_version == CURRENT_SCHEMA_VERSION
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_is_empty_and_current() {
        let snapshot = Snapshot::new();
        assert_eq!(snapshot.export_version, EXPORT_VERSION);
        assert!(snapshot.is_schema_compatible());
        assert!(snapshot.exported_by.starts_with("entity-index v"));
        assert!(snapshot.tables.is_empty());
    }

    #[test]
    fn from_json_reads_tables() {
        let json = r#"{
            "schema_version": 1,
            "export_version": "1.0.0",
            "exported_at": "2026-01-01T00:00:00Z",
            "exported_by": "entity-index v0.1.0",
            "tables": {"entities": [{"name": "subject", "is_metadata": 0}]}
        }"#;
        let snapshot = Snapshot::from_json(json).unwrap();
        assert!(snapshot.is_schema_compatible());
        assert_eq!(snapshot.get_table("entities").unwrap()[0]["name"], "subject");
        assert!(Snapshot::from_json("{\"tables\": {}}").is_err());
    }

    #[test]
    fn gzip_file_is_detected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = Snapshot::new();
        snapshot.tables.insert(
            "files".to_string(),
            vec![serde_json::json!({"path": "/data/a.nii"})],
        );

        let plain = dir.path().join("snap.json");
        let gz = dir.path().join("snap.json.gz");
        snapshot
            .write_to(std::fs::File::create(&plain).unwrap(), false)
            .unwrap();
        snapshot
            .write_to(std::fs::File::create(&gz).unwrap(), true)
            .unwrap();

        for path in [plain, gz] {
            let loaded = Snapshot::from_file(&path).unwrap();
            assert_eq!(loaded.table_names(), vec!["files"]);
            assert_eq!(loaded.tables, snapshot.tables);
        }
    }
}
