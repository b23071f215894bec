//! Row-oriented table facade.
//!
//! A [`Table`] binds a named B+Tree file as a table of rows addressed by
//! string primary keys. It is a thin adapter: every operation delegates
//! to the underlying storage engine, with keys encoded as UTF-8.

use jparque_btree::BTreeEngine;
use jparque_result::Result;
use jparque_storage::{FieldMap, StorageEngine};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// A named table stored as `<dir>/<name>.db`.
pub struct Table {
    storage: BTreeEngine,
    name: String,
    path: PathBuf,
}

impl Table {
    /// Open or create the table with the default page size.
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(format!("{name}.db"));
        Ok(Self {
            storage: BTreeEngine::open(&path)?,
            name: name.to_string(),
            path,
        })
    }

    /// Open or create the table with a custom page size.
    pub fn open_with_page_size(dir: &Path, name: &str, page_size: usize) -> Result<Self> {
        let path = dir.join(format!("{name}.db"));
        Ok(Self {
            storage: BTreeEngine::open_with_page_size(&path, page_size)?,
            name: name.to_string(),
            path,
        })
    }

    /// Insert or replace the row under `key`.
    ///
    /// Replacement goes through delete-then-write so the new row may have
    /// any encoded size.
    pub fn insert(&mut self, key: &str, row: FieldMap) -> Result<()> {
        let key_bytes = key.as_bytes();
        if self.storage.read(key_bytes)?.is_some() {
            self.storage.delete(key_bytes)?;
        }
        self.storage.write(key_bytes, row)
    }

    /// Look up a row by its primary key.
    pub fn find(&mut self, key: &str) -> Result<Option<FieldMap>> {
        self.storage.read(key.as_bytes())
    }

    /// Insert several rows.
    pub fn batch_insert(&mut self, rows: FxHashMap<String, FieldMap>) -> Result<()> {
        for (key, row) in rows {
            self.insert(&key, row)?;
        }
        Ok(())
    }

    /// Rows whose keys fall in `[start_key, end_key]` (the underlying
    /// engine's inclusive bound; `None` scans to the end), optionally
    /// projected to `columns`.
    pub fn scan(
        &mut self,
        start_key: &str,
        end_key: Option<&str>,
        columns: Option<&[String]>,
    ) -> Result<FxHashMap<String, FieldMap>> {
        let records = self.storage.scan(
            start_key.as_bytes(),
            end_key.map(str::as_bytes),
            columns,
        )?;
        let mut rows = FxHashMap::default();
        for record in records {
            let key = String::from_utf8_lossy(&record.key).into_owned();
            rows.insert(key, record.fields);
        }
        Ok(rows)
    }

    /// Delete the row under `key`; missing keys are a no-op.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.storage.delete(key.as_bytes())
    }

    /// Close the backing storage engine.
    pub fn close(&mut self) -> Result<()> {
        self.storage.close()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jparque_storage::Value;
    use tempfile::TempDir;

    fn row(pairs: &[(&str, Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn insert_find_and_delete() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path(), "people").unwrap();
        assert_eq!(table.name(), "people");

        table
            .insert("alice", row(&[("age", Value::Int32(30))]))
            .unwrap();
        assert_eq!(
            table.find("alice").unwrap().unwrap()["age"],
            Value::Int32(30)
        );
        assert!(table.find("bob").unwrap().is_none());

        table.delete("alice").unwrap();
        assert!(table.find("alice").unwrap().is_none());
    }

    #[test]
    fn insert_replaces_rows_of_any_size() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path(), "people").unwrap();

        table
            .insert("k", row(&[("v", Value::Str("short".into()))]))
            .unwrap();
        table
            .insert(
                "k",
                row(&[("v", Value::Str("a considerably longer value".into()))]),
            )
            .unwrap();
        assert_eq!(
            table.find("k").unwrap().unwrap()["v"],
            Value::Str("a considerably longer value".into())
        );
    }

    #[test]
    fn batch_insert_and_scan() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path(), "people").unwrap();

        let mut rows = FxHashMap::default();
        for i in 0..10 {
            rows.insert(format!("row-{i}"), row(&[("i", Value::Int32(i))]));
        }
        table.batch_insert(rows).unwrap();

        let hits = table.scan("row-2", Some("row-5"), None).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits["row-3"]["i"], Value::Int32(3));

        let columns = vec!["i".to_string()];
        let projected = table.scan("row-0", Some("row-0"), Some(&columns)).unwrap();
        assert_eq!(projected["row-0"].len(), 1);
    }

    #[test]
    fn table_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut table = Table::open(dir.path(), "t").unwrap();
            table.insert("k", row(&[("v", Value::Int32(1))])).unwrap();
            table.close().unwrap();
        }
        let mut table = Table::open(dir.path(), "t").unwrap();
        assert_eq!(table.find("k").unwrap().unwrap()["v"], Value::Int32(1));
    }
}
