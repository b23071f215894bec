//! Row groups: horizontal partitions holding one column chunk per field.

use crate::chunk::ColumnChunk;
use crate::cursor::ByteReader;
use jparque_result::{Error, Result};

/// An ordered list of column chunks covering `row_count` records, written
/// as `[u32 record_count]` followed by each chunk in schema field order.
#[derive(Debug, Clone)]
pub struct RowGroup {
    columns: Vec<ColumnChunk>,
    row_count: u64,
}

impl RowGroup {
    pub fn new(columns: Vec<ColumnChunk>, row_count: u64) -> Self {
        Self { columns, row_count }
    }

    pub fn columns(&self) -> &[ColumnChunk] {
        &self.columns
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Serialize onto `out`. Returns bytes written.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        out.extend_from_slice(&(self.row_count as u32).to_be_bytes());
        for column in &self.columns {
            column.write_to(out)?;
        }
        Ok(out.len() - start)
    }

    /// Parse a row group with `field_count` column chunks.
    pub(crate) fn read_from(reader: &mut ByteReader<'_>, field_count: usize) -> Result<Self> {
        let row_count = reader.read_u32()? as u64;
        if row_count as usize > reader.remaining() {
            return Err(Error::corrupt(format!(
                "row group claims {row_count} records with only {} bytes left",
                reader.remaining()
            )));
        }
        let mut columns = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            columns.push(ColumnChunk::read_from(reader)?);
        }
        Ok(Self { columns, row_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionCodec;
    use crate::page::{DataPage, Statistics};
    use crate::schema::PhysicalType;

    #[test]
    fn row_group_round_trips() {
        let columns = vec![
            ColumnChunk::new(
                PhysicalType::Int32,
                CompressionCodec::Uncompressed,
                3,
                vec![DataPage::new(
                    vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3],
                    3,
                    Statistics::default(),
                )],
            ),
            ColumnChunk::new(
                PhysicalType::Binary,
                CompressionCodec::Uncompressed,
                3,
                vec![DataPage::new(b"abc".to_vec(), 3, Statistics::default())],
            ),
        ];
        let group = RowGroup::new(columns, 3);

        let mut out = Vec::new();
        group.write_to(&mut out).unwrap();

        let mut reader = ByteReader::new(&out);
        let parsed = RowGroup::read_from(&mut reader, 2).unwrap();
        assert_eq!(parsed.row_count(), 3);
        assert_eq!(parsed.columns().len(), 2);
        assert_eq!(parsed.columns()[0].physical_type(), PhysicalType::Int32);
        assert_eq!(reader.remaining(), 0);
    }
}
