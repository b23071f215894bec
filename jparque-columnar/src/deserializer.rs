//! Read path: columnar file bytes back to records of field maps.

use crate::cursor::ByteReader;
use crate::metadata::FileMetadata;
use crate::rowgroup::RowGroup;
use crate::schema::{Field, LogicalType, PhysicalType, Repetition};
use crate::PARQUET_MAGIC;
use jparque_result::{Error, Result};
use jparque_storage::{FieldMap, Value};
use std::fs;
use std::path::Path;

/// Trailer: 8-byte metadata offset plus 4-byte magic.
const TRAILER_LEN: usize = 12;

/// Reads files produced by [`crate::ParquetSerializer`]. The schema comes
/// from the file's own metadata block, so no out-of-band schema is
/// needed.
#[derive(Debug, Default)]
pub struct ParquetDeserializer;

impl ParquetDeserializer {
    pub fn new() -> Self {
        Self
    }

    /// Read every record in the file at `path`.
    pub fn read(&self, path: &Path) -> Result<Vec<FieldMap>> {
        let bytes = fs::read(path)?;
        self.read_bytes(&bytes)
    }

    /// Parse and return only the metadata block of the file at `path`.
    pub fn read_metadata(&self, path: &Path) -> Result<FileMetadata> {
        let bytes = fs::read(path)?;
        Self::metadata_from_bytes(&bytes)
    }

    /// Read every record from an in-memory file image.
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<Vec<FieldMap>> {
        let metadata = Self::metadata_from_bytes(bytes)?;
        let schema = &metadata.schema;

        let mut reader = ByteReader::new(bytes);
        reader.seek(PARQUET_MAGIC.len())?;
        let group_count = reader.read_u32()? as usize;
        if group_count != metadata.row_groups.len() {
            return Err(Error::corrupt(format!(
                "body holds {group_count} row groups but metadata indexes {}",
                metadata.row_groups.len()
            )));
        }

        let mut records = Vec::new();
        for _ in 0..group_count {
            let group = RowGroup::read_from(&mut reader, schema.fields().len())?;
            records.extend(Self::decode_row_group(&group, schema.fields())?);
        }
        Ok(records)
    }

    fn decode_row_group(group: &RowGroup, fields: &[Field]) -> Result<Vec<FieldMap>> {
        let row_count = group.row_count() as usize;
        let mut records = vec![FieldMap::default(); row_count];

        for (field, chunk) in fields.iter().zip(group.columns()) {
            if chunk.physical_type() != field.physical_type {
                return Err(Error::corrupt(format!(
                    "column chunk for '{}' holds {:?}, schema says {:?}",
                    field.name,
                    chunk.physical_type(),
                    field.physical_type
                )));
            }
            let payload = chunk.payload();
            let mut values = ByteReader::new(&payload);
            for record in records.iter_mut() {
                if let Some(value) = decode_field_value(&mut values, field)? {
                    record.insert(field.name.clone(), value);
                }
            }
            if values.remaining() != 0 {
                return Err(Error::corrupt(format!(
                    "column '{}' carries {} undecoded trailing bytes",
                    field.name,
                    values.remaining()
                )));
            }
        }
        Ok(records)
    }

    fn metadata_from_bytes(bytes: &[u8]) -> Result<FileMetadata> {
        if bytes.len() < PARQUET_MAGIC.len() * 2 + TRAILER_LEN {
            return Err(Error::corrupt("file too short to be a columnar file"));
        }
        if bytes[..4] != PARQUET_MAGIC {
            return Err(Error::corrupt("incorrect magic number at file start"));
        }
        if bytes[bytes.len() - 4..] != PARQUET_MAGIC {
            return Err(Error::corrupt("incorrect magic number at file end"));
        }

        let offset_pos = bytes.len() - TRAILER_LEN;
        let mut trailer = ByteReader::new(bytes);
        trailer.seek(offset_pos)?;
        let metadata_offset = trailer.read_u64()? as usize;
        if metadata_offset < PARQUET_MAGIC.len() || metadata_offset >= offset_pos {
            return Err(Error::corrupt(format!(
                "metadata offset {metadata_offset} outside file body"
            )));
        }

        let mut reader = ByteReader::new(bytes);
        reader.seek(metadata_offset)?;
        FileMetadata::read_from(&mut reader)
    }
}

fn decode_field_value(reader: &mut ByteReader<'_>, field: &Field) -> Result<Option<Value>> {
    if field.repetition == Repetition::Optional && reader.read_u8()? == 1 {
        return Ok(None);
    }

    if field.repetition == Repetition::Repeated {
        let count = reader.read_u32()? as usize;
        if count > reader.remaining() {
            return Err(Error::corrupt(format!(
                "repeated field '{}' claims {count} elements with {} bytes left",
                field.name,
                reader.remaining()
            )));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(decode_single(reader, field)?);
        }
        return Ok(Some(Value::List(items)));
    }

    Ok(Some(decode_single(reader, field)?))
}

fn decode_single(reader: &mut ByteReader<'_>, field: &Field) -> Result<Value> {
    match field.physical_type {
        PhysicalType::Int32 => Ok(Value::Int32(reader.read_i32()?)),
        PhysicalType::Int64 => Ok(Value::Int64(reader.read_i64()?)),
        PhysicalType::Binary => {
            let bytes = reader.read_len_prefixed()?;
            if field.logical_type == Some(LogicalType::Utf8) {
                let s = std::str::from_utf8(bytes).map_err(|_| {
                    Error::corrupt(format!("field '{}' holds invalid UTF-8", field.name))
                })?;
                Ok(Value::Str(s.to_string()))
            } else {
                Ok(Value::Bytes(bytes.to_vec()))
            }
        }
        other => Err(Error::Unsupported(format!(
            "cannot decode physical type {other:?} for field '{}'",
            field.name
        ))),
    }
}
