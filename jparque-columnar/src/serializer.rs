//! Write path: records of field maps down to the columnar file layout.

use crate::chunk::ColumnChunk;
use crate::compression::CompressionCodec;
use crate::metadata::{FileMetadata, RowGroupMeta};
use crate::page::{DataPage, Statistics};
use crate::rowgroup::RowGroup;
use crate::schema::{Field, LogicalType, MessageType, PhysicalType, Repetition};
use crate::PARQUET_MAGIC;
use jparque_result::{Error, Result};
use jparque_storage::{FieldMap, Value};
use rustc_hash::FxHashSet;
use std::fs;
use std::path::Path;

/// Records per row group before a new one is started.
pub const DEFAULT_ROW_GROUP_RECORDS: usize = 65_536;

/// Serialization knobs.
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    pub codec: CompressionCodec,
    pub max_row_group_records: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::Uncompressed,
            max_row_group_records: DEFAULT_ROW_GROUP_RECORDS,
        }
    }
}

impl SerializerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_max_row_group_records(mut self, max: usize) -> Self {
        self.max_row_group_records = max;
        self
    }
}

/// Binds records-of-maps to the columnar on-disk layout.
///
/// Every record is validated against the schema before a single byte is
/// emitted: required fields must be present, repeated fields must be
/// list-shaped, and scalar types must match.
pub struct ParquetSerializer {
    schema: MessageType,
    config: SerializerConfig,
}

impl ParquetSerializer {
    pub fn new(schema: MessageType) -> Self {
        Self::with_config(schema, SerializerConfig::default())
    }

    pub fn with_config(schema: MessageType, config: SerializerConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &MessageType {
        &self.schema
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Serialize `records` into the file at `path`, replacing it.
    pub fn serialize(&self, records: &[FieldMap], path: &Path) -> Result<()> {
        let bytes = self.serialize_to_bytes(records)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Check one record against the schema without writing anything.
    pub fn validate(&self, record: &FieldMap) -> Result<()> {
        self.validate_record(record)
    }

    /// Serialize `records` into an in-memory file image.
    pub fn serialize_to_bytes(&self, records: &[FieldMap]) -> Result<Vec<u8>> {
        for record in records {
            self.validate_record(record)?;
        }

        let mut out = PARQUET_MAGIC.to_vec();
        let group_size = self.config.max_row_group_records.max(1);
        let groups: Vec<&[FieldMap]> = records.chunks(group_size).collect();

        out.extend_from_slice(&(groups.len() as u32).to_be_bytes());
        let mut group_metas = Vec::with_capacity(groups.len());
        for group in groups {
            let start_offset = out.len() as u64;
            let row_group = self.build_row_group(group)?;
            let written = row_group.write_to(&mut out)?;
            group_metas.push(RowGroupMeta {
                row_count: group.len() as u64,
                total_byte_size: written as u64,
                start_offset,
            });
        }

        let metadata_offset = out.len() as u64;
        FileMetadata::new(self.schema.clone(), self.config.codec, group_metas).write_to(&mut out);
        out.extend_from_slice(&metadata_offset.to_be_bytes());
        out.extend_from_slice(&PARQUET_MAGIC);
        Ok(out)
    }

    fn build_row_group(&self, group: &[FieldMap]) -> Result<RowGroup> {
        let mut columns = Vec::with_capacity(self.schema.fields().len());
        for field in self.schema.fields() {
            let mut buf = Vec::new();
            let mut stats = Statistics::default();
            let mut distinct: FxHashSet<Vec<u8>> = FxHashSet::default();
            for record in group {
                encode_field_value(
                    &mut buf,
                    field,
                    record.get(&field.name),
                    &mut stats,
                    &mut distinct,
                )?;
            }
            stats.distinct_count = distinct.len() as u64;
            let page = DataPage::new(buf, group.len() as u32, stats);
            columns.push(ColumnChunk::new(
                field.physical_type,
                self.config.codec,
                group.len() as u64,
                vec![page],
            ));
        }
        Ok(RowGroup::new(columns, group.len() as u64))
    }

    fn validate_record(&self, record: &FieldMap) -> Result<()> {
        for field in self.schema.fields() {
            let value = record.get(&field.name).filter(|v| !v.is_null());
            match (field.repetition, value) {
                (Repetition::Required, None) => {
                    return Err(Error::invalid(format!(
                        "missing required field: {}",
                        field.name
                    )));
                }
                (_, None) => {}
                (Repetition::Repeated, Some(Value::List(items))) => {
                    for item in items {
                        validate_single(field, item)?;
                    }
                }
                (Repetition::Repeated, Some(other)) => {
                    return Err(Error::invalid(format!(
                        "invalid type for repeated field '{}': expected a list, got {}",
                        field.name,
                        value_kind(other)
                    )));
                }
                (_, Some(v)) => validate_single(field, v)?,
            }
        }
        Ok(())
    }
}

fn validate_single(field: &Field, value: &Value) -> Result<()> {
    let ok = match field.physical_type {
        PhysicalType::Int32 => matches!(value, Value::Int32(_)),
        PhysicalType::Int64 => matches!(value, Value::Int64(_)),
        PhysicalType::Binary => {
            if field.logical_type == Some(LogicalType::Utf8) {
                matches!(value, Value::Str(_))
            } else {
                matches!(value, Value::Str(_) | Value::Bytes(_))
            }
        }
        other => {
            return Err(Error::invalid(format!(
                "unsupported type for field '{}': {other:?}",
                field.name
            )));
        }
    };
    if !ok {
        return Err(Error::invalid(format!(
            "invalid type for field '{}': expected {:?}, got {}",
            field.name,
            field.physical_type,
            value_kind(value)
        )));
    }
    Ok(())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Int32(_) => "int32",
        Value::Int64(_) => "int64",
        Value::Float32(_) => "float32",
        Value::Float64(_) => "float64",
        Value::Bool(_) => "bool",
        Value::Str(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::List(_) => "list",
    }
}

/// Encode one record's value for `field` onto the column buffer.
///
/// Optional fields carry a one-byte absent flag (1 terminates the record
/// for this field); repeated fields carry a `u32` element count; single
/// values follow the per-type plain encoding.
fn encode_field_value(
    buf: &mut Vec<u8>,
    field: &Field,
    value: Option<&Value>,
    stats: &mut Statistics,
    distinct: &mut FxHashSet<Vec<u8>>,
) -> Result<()> {
    let value = value.filter(|v| !v.is_null());

    if field.repetition == Repetition::Optional {
        buf.push(u8::from(value.is_none()));
        if value.is_none() {
            stats.null_count += 1;
            return Ok(());
        }
    }

    if field.repetition == Repetition::Repeated {
        let items: &[Value] = match value {
            Some(Value::List(items)) => items,
            None => &[],
            Some(other) => {
                return Err(Error::invalid(format!(
                    "invalid type for repeated field '{}': expected a list, got {}",
                    field.name,
                    value_kind(other)
                )));
            }
        };
        buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
        for item in items {
            encode_single(buf, field, item, stats, distinct)?;
        }
        return Ok(());
    }

    let value = value.ok_or_else(|| {
        Error::Internal(format!(
            "field '{}' lost its value between validation and encoding",
            field.name
        ))
    })?;
    encode_single(buf, field, value, stats, distinct)
}

fn encode_single(
    buf: &mut Vec<u8>,
    field: &Field,
    value: &Value,
    stats: &mut Statistics,
    distinct: &mut FxHashSet<Vec<u8>>,
) -> Result<()> {
    let start = buf.len();
    match (field.physical_type, value) {
        (PhysicalType::Int32, Value::Int32(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (PhysicalType::Int64, Value::Int64(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (PhysicalType::Binary, Value::Str(s)) => {
            buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        (PhysicalType::Binary, Value::Bytes(b)) => {
            buf.extend_from_slice(&(b.len() as u32).to_be_bytes());
            buf.extend_from_slice(b);
        }
        (expected, got) => {
            return Err(Error::invalid(format!(
                "invalid type for field '{}': expected {expected:?}, got {}",
                field.name,
                value_kind(got)
            )));
        }
    }
    let encoded = buf[start..].to_vec();
    stats.observe(&encoded);
    distinct.insert(encoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn row_group_statistics_count_nulls_and_distincts() {
        let schema = MessageType::builder("t")
            .field("score", PhysicalType::Int32, Repetition::Optional)
            .build();
        let serializer = ParquetSerializer::new(schema);

        let records = vec![
            fields(&[("score", Value::Int32(5))]),
            fields(&[]),
            fields(&[("score", Value::Int32(9))]),
            fields(&[("score", Value::Int32(5))]),
        ];
        let group = serializer.build_row_group(&records).unwrap();
        let stats = group.columns()[0].pages()[0].statistics().clone();

        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.distinct_count, 2);
        assert_eq!(stats.min, 5i32.to_be_bytes());
        assert_eq!(stats.max, 9i32.to_be_bytes());
    }

    #[test]
    fn optional_values_carry_presence_flags() {
        let field = Field::new("v", PhysicalType::Int32, Repetition::Optional);
        let mut buf = Vec::new();
        let mut stats = Statistics::default();
        let mut distinct = FxHashSet::default();

        encode_field_value(&mut buf, &field, Some(&Value::Int32(7)), &mut stats, &mut distinct)
            .unwrap();
        encode_field_value(&mut buf, &field, None, &mut stats, &mut distinct).unwrap();

        assert_eq!(buf, [0, 0, 0, 0, 7, 1]);
        assert_eq!(stats.null_count, 1);
    }

    #[test]
    fn repeated_values_carry_element_counts() {
        let field = Field::annotated(
            "tags",
            PhysicalType::Binary,
            Repetition::Repeated,
            LogicalType::Utf8,
        );
        let mut buf = Vec::new();
        let mut stats = Statistics::default();
        let mut distinct = FxHashSet::default();

        let list = Value::List(vec![Value::Str("ab".into()), Value::Str("c".into())]);
        encode_field_value(&mut buf, &field, Some(&list), &mut stats, &mut distinct).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&2u32.to_be_bytes());
        expected.extend_from_slice(&2u32.to_be_bytes());
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.extend_from_slice(b"c");
        assert_eq!(buf, expected);
        assert_eq!(distinct.len(), 2);
    }
}
