//! Table export for snapshots.
//!
//! Each table is queried with deterministic ordering so two exports of the
//! same tree compare equal.

use super::Database;
use anyhow::{Result, bail};
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Tables included in an export, with the ordering applied to each.
pub const EXPORTED_TABLES: &[(&str, &str)] = &[
    ("files", "ORDER BY path"),
    ("entities", "ORDER BY name"),
    ("tags", "ORDER BY file_path, entity_name"),
    ("associations", "ORDER BY src, dst, kind"),
];

/// Columns omitted from exported rows because they differ between runs.
const VOLATILE_COLUMNS: &[&str] = &["indexed_at"];

/// Options for controlling export behavior.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Optional list of specific tables to export. If None, export all tables.
    pub tables: Option<Vec<String>>,
    /// Keep columns such as `indexed_at` that change on every run.
    pub include_volatile: bool,
}

impl Database {
    /// Export the index tables as JSON rows keyed by table name.
    pub fn export_tables(&self, options: &ExportOptions) -> Result<BTreeMap<String, Vec<Value>>> {
        if let Some(requested) = &options.tables {
            for name in requested {
                if !EXPORTED_TABLES.iter().any(|(table, _)| *table == name.as_str()) {
                    bail!("unknown table '{name}'");
                }
            }
        }

        let should_export = |table: &str| -> bool {
            options
                .tables
                .as_ref()
                .is_none_or(|t| t.iter().any(|s| s == table))
        };

        let mut tables = BTreeMap::new();
        for &(table, ordering) in EXPORTED_TABLES {
            if should_export(table) {
                let rows = self.export_table(table, ordering, options.include_volatile)?;
                tables.insert(table.to_string(), rows);
            }
        }
        Ok(tables)
    }

    fn export_table(&self, table: &str, ordering: &str, include_volatile: bool) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {table} {ordering}"))?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut obj = Map::new();
                for (i, column) in columns.iter().enumerate() {
                    if !include_volatile && VOLATILE_COLUMNS.contains(&column.as_str()) {
                        continue;
                    }
                    obj.insert(column.clone(), column_value(table, column, row.get_ref(i)?));
                }
                out.push(Value::Object(obj));
            }
            Ok(out)
        })
    }
}

fn column_value(table: &str, column: &str, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            // Tag values are stored as JSON text; export them as JSON.
            if table == "tags" && column == "value" {
                serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
            } else {
                Value::String(text.into_owned())
            }
        }
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}
