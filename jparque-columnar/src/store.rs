//! Keyed storage engine over the columnar codec.
//!
//! The store keeps the whole data set as an in-memory record list and
//! rewrites the file on every change; reads and scans answer from the
//! cache, which is loaded lazily on first access after open. Each cached
//! record carries the binary key in an internal `_key` column appended to
//! the user schema, so a reopened store can still address records by key.

use crate::deserializer::ParquetDeserializer;
use crate::schema::{Field, MessageType, PhysicalType, Repetition};
use crate::serializer::{ParquetSerializer, SerializerConfig};
use jparque_result::{Error, Result};
use jparque_storage::{FieldMap, Record, StorageEngine, Value};
use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Internal column carrying the record key.
pub const KEY_FIELD: &str = "_key";

/// Key-addressed facade over a single columnar file.
///
/// `scan` treats its end bound as *exclusive*.
pub struct ColumnStore {
    path: PathBuf,
    schema: MessageType,
    serializer: ParquetSerializer,
    deserializer: ParquetDeserializer,
    cache: Vec<FieldMap>,
    loaded: bool,
    tombstones: FxHashSet<Vec<u8>>,
    dirty: bool,
    open: bool,
}

impl ColumnStore {
    /// Create or open the store backed by `<dir>/<name>.parquet`.
    pub fn open(dir: &Path, name: &str, schema: MessageType) -> Result<Self> {
        Self::with_config(dir, name, schema, SerializerConfig::default())
    }

    /// Same as [`ColumnStore::open`] with explicit serialization knobs.
    pub fn with_config(
        dir: &Path,
        name: &str,
        schema: MessageType,
        config: SerializerConfig,
    ) -> Result<Self> {
        if schema.field(KEY_FIELD).is_some() {
            return Err(Error::invalid(format!(
                "schema field name '{KEY_FIELD}' is reserved"
            )));
        }
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.parquet"));

        let storage_schema = schema.with_field(Field::new(
            KEY_FIELD,
            PhysicalType::Binary,
            Repetition::Required,
        ))?;

        Ok(Self {
            path,
            schema,
            serializer: ParquetSerializer::with_config(storage_schema, config),
            deserializer: ParquetDeserializer::new(),
            cache: Vec::new(),
            loaded: false,
            tombstones: FxHashSet::default(),
            dirty: false,
            open: true,
        })
    }

    /// The user-facing schema (without the internal key column).
    pub fn schema(&self) -> &MessageType {
        &self.schema
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            return Err(Error::Internal("column store is closed".to_string()));
        }
        Ok(())
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        if self.path.exists() {
            self.cache = self.deserializer.read(&self.path)?;
        }
        self.loaded = true;
        Ok(())
    }

    fn key_of(record: &FieldMap) -> Option<&[u8]> {
        match record.get(KEY_FIELD) {
            Some(Value::Bytes(key)) => Some(key),
            _ => None,
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.serializer.serialize(&self.cache, &self.path)?;
        self.dirty = false;
        Ok(())
    }

    fn make_record(key: &[u8], fields: FieldMap) -> FieldMap {
        let mut record = fields;
        record.insert(KEY_FIELD.to_string(), Value::Bytes(key.to_vec()));
        record
    }

    fn apply(&mut self, key: &[u8], record: FieldMap) {
        self.tombstones.remove(key);
        self.cache
            .retain(|cached| Self::key_of(cached) != Some(key));
        self.cache.push(record);
        self.dirty = true;
    }

    fn strip_key(mut record: FieldMap) -> FieldMap {
        record.remove(KEY_FIELD);
        record
    }
}

impl StorageEngine for ColumnStore {
    fn write(&mut self, key: &[u8], value: FieldMap) -> Result<()> {
        self.ensure_open()?;
        // Validate before touching the cache, so a rejected record leaves
        // the store exactly as it was.
        let record = Self::make_record(key, value);
        self.serializer.validate(&record)?;

        self.ensure_loaded()?;
        self.apply(key, record);
        self.flush()
    }

    /// Batch write with exactly one file rewrite.
    fn write_batch(&mut self, records: Vec<Record>) -> Result<()> {
        self.ensure_open()?;
        if records.is_empty() {
            return Ok(());
        }
        let prepared: Vec<(Vec<u8>, FieldMap)> = records
            .into_iter()
            .map(|r| (r.key, r.fields))
            .map(|(key, fields)| {
                let record = Self::make_record(&key, fields);
                (key, record)
            })
            .collect();
        for (_, record) in &prepared {
            self.serializer.validate(record)?;
        }

        self.ensure_loaded()?;
        for (key, record) in prepared {
            self.apply(&key, record);
        }
        self.flush()
    }

    fn read(&mut self, key: &[u8]) -> Result<Option<FieldMap>> {
        self.ensure_open()?;
        if self.tombstones.contains(key) {
            return Ok(None);
        }
        self.ensure_loaded()?;
        Ok(self
            .cache
            .iter()
            .find(|record| Self::key_of(record) == Some(key))
            .cloned()
            .map(Self::strip_key))
    }

    /// Ordered scan over `[start_key, end_key)`; a `None` end bound runs
    /// to the end of the store.
    fn scan(
        &mut self,
        start_key: &[u8],
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<Record>> {
        self.ensure_open()?;
        self.ensure_loaded()?;

        let mut results = Vec::new();
        for record in &self.cache {
            let Some(key) = Self::key_of(record) else {
                continue;
            };
            if key < start_key {
                continue;
            }
            if let Some(end) = end_key {
                // Exclusive end bound.
                if key >= end {
                    continue;
                }
            }
            if self.tombstones.contains(key) {
                continue;
            }

            let fields = match columns {
                Some(cols) if !cols.is_empty() => {
                    let mut projected = FieldMap::default();
                    for col in cols {
                        if let Some(v) = record.get(col) {
                            projected.insert(col.clone(), v.clone());
                        }
                    }
                    projected
                }
                _ => Self::strip_key(record.clone()),
            };
            results.push(Record::new(key.to_vec(), fields));
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.ensure_loaded()?;
        self.tombstones.insert(key.to_vec());

        let before = self.cache.len();
        self.cache
            .retain(|record| Self::key_of(record) != Some(key));
        if self.cache.len() != before {
            self.dirty = true;
            self.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        if self.dirty {
            self.flush()?;
        }
        self.open = false;
        Ok(())
    }
}
