//! File metadata: schema, version, creator, codec, and the row-group
//! index, written as one block located through the trailing offset.

use crate::compression::CompressionCodec;
use crate::cursor::ByteReader;
use crate::schema::{Field, LogicalType, MessageType, PhysicalType, Repetition};
use jparque_result::{Error, Result};

/// Writer identification embedded in every file.
pub const CREATED_BY: &str = "jparque version 1";

/// Index entry for one row group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroupMeta {
    pub row_count: u64,
    pub total_byte_size: u64,
    /// Absolute file offset of the row group's first byte.
    pub start_offset: u64,
}

/// The metadata block.
///
/// Layout: `[u32 version][u32 codec][u32 len][schema name]
/// [u32 field_count]` then per field `[u32 len][name][u32 type]
/// [u32 repetition][i32 logical or -1]`, then `[u32 len][creator]`,
/// then `[u64 group_count]` and per group `[u64 row_count]
/// [u64 total_byte_size][u64 start_offset]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub schema: MessageType,
    pub version: u32,
    pub created_by: String,
    pub codec: CompressionCodec,
    pub row_groups: Vec<RowGroupMeta>,
}

impl FileMetadata {
    pub fn new(
        schema: MessageType,
        codec: CompressionCodec,
        row_groups: Vec<RowGroupMeta>,
    ) -> Self {
        let version = schema.version();
        Self {
            schema,
            version,
            created_by: CREATED_BY.to_string(),
            codec,
            row_groups,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.codec.value().to_be_bytes());

        write_string(out, self.schema.name());
        out.extend_from_slice(&(self.schema.fields().len() as u32).to_be_bytes());
        for field in self.schema.fields() {
            write_string(out, &field.name);
            out.extend_from_slice(&field.physical_type.value().to_be_bytes());
            out.extend_from_slice(&field.repetition.value().to_be_bytes());
            let logical = field.logical_type.map_or(-1, LogicalType::value);
            out.extend_from_slice(&logical.to_be_bytes());
        }

        write_string(out, &self.created_by);

        out.extend_from_slice(&(self.row_groups.len() as u64).to_be_bytes());
        for group in &self.row_groups {
            out.extend_from_slice(&group.row_count.to_be_bytes());
            out.extend_from_slice(&group.total_byte_size.to_be_bytes());
            out.extend_from_slice(&group.start_offset.to_be_bytes());
        }
    }

    pub(crate) fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let version = reader.read_u32()?;
        let codec = CompressionCodec::from_value(reader.read_i32()?)?;

        let schema_name = reader.read_string()?;
        let field_count = reader.read_u32()? as usize;
        if field_count > reader.remaining() {
            return Err(Error::corrupt(format!(
                "metadata claims {field_count} fields with only {} bytes left",
                reader.remaining()
            )));
        }
        let mut builder = MessageType::builder(schema_name);
        for _ in 0..field_count {
            let name = reader.read_string()?;
            let physical_type = PhysicalType::from_value(reader.read_i32()?)?;
            let repetition = Repetition::from_value(reader.read_i32()?)?;
            let logical_tag = reader.read_i32()?;
            let mut field = Field::new(name, physical_type, repetition);
            if logical_tag >= 0 {
                field.logical_type = Some(LogicalType::from_value(logical_tag)?);
            }
            builder = builder.add(field);
        }
        let schema = builder.build();

        let created_by = reader.read_string()?;

        let group_count = reader.read_u64()? as usize;
        if group_count > reader.remaining() {
            return Err(Error::corrupt(format!(
                "metadata claims {group_count} row groups with only {} bytes left",
                reader.remaining()
            )));
        }
        let mut row_groups = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            row_groups.push(RowGroupMeta {
                row_count: reader.read_u64()?,
                total_byte_size: reader.read_u64()?,
                start_offset: reader.read_u64()?,
            });
        }

        Ok(Self {
            schema,
            version,
            created_by,
            codec,
            row_groups,
        })
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips() {
        let schema = MessageType::builder("person")
            .annotated_field(
                "name",
                PhysicalType::Binary,
                Repetition::Required,
                LogicalType::Utf8,
            )
            .field("age", PhysicalType::Int32, Repetition::Required)
            .field("payload", PhysicalType::Binary, Repetition::Optional)
            .build();
        let meta = FileMetadata::new(
            schema,
            CompressionCodec::Zstd,
            vec![
                RowGroupMeta {
                    row_count: 10,
                    total_byte_size: 1234,
                    start_offset: 8,
                },
                RowGroupMeta {
                    row_count: 3,
                    total_byte_size: 99,
                    start_offset: 1242,
                },
            ],
        );

        let mut out = Vec::new();
        meta.write_to(&mut out);
        let mut reader = ByteReader::new(&out);
        let parsed = FileMetadata::read_from(&mut reader).unwrap();
        assert_eq!(parsed, meta);
        assert_eq!(parsed.created_by, CREATED_BY);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn absent_logical_type_reads_back_as_none() {
        let schema = MessageType::builder("t")
            .field("raw", PhysicalType::Binary, Repetition::Required)
            .build();
        let meta = FileMetadata::new(schema, CompressionCodec::Uncompressed, Vec::new());
        let mut out = Vec::new();
        meta.write_to(&mut out);
        let parsed = FileMetadata::read_from(&mut ByteReader::new(&out)).unwrap();
        assert_eq!(parsed.schema.fields()[0].logical_type, None);
    }
}
