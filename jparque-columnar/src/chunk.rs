//! Column chunks: all of one field's data within a row group.

use crate::compression::{compressor_for, CompressionCodec};
use crate::cursor::ByteReader;
use crate::page::DataPage;
use crate::schema::PhysicalType;
use jparque_result::{Error, Result};

/// One field's pages within a row group, prefixed on disk by
/// `[u32 physical_type][u32 codec][u64 value_count][u64 total_size]`.
/// Compression applies to page payloads only; headers stay readable.
#[derive(Debug, Clone)]
pub struct ColumnChunk {
    physical_type: PhysicalType,
    codec: CompressionCodec,
    value_count: u64,
    pages: Vec<DataPage>,
}

impl ColumnChunk {
    pub fn new(
        physical_type: PhysicalType,
        codec: CompressionCodec,
        value_count: u64,
        pages: Vec<DataPage>,
    ) -> Self {
        Self {
            physical_type,
            codec,
            value_count,
            pages,
        }
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    pub fn codec(&self) -> CompressionCodec {
        self.codec
    }

    pub fn value_count(&self) -> u64 {
        self.value_count
    }

    pub fn pages(&self) -> &[DataPage] {
        &self.pages
    }

    /// Serialize prefix and pages onto `out`. Returns bytes written.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize> {
        let compressor = compressor_for(self.codec)?;

        // Pages first, so the prefix can carry their exact on-disk size.
        let mut body = Vec::new();
        for page in &self.pages {
            page.write_to(&mut body, compressor.as_ref())?;
        }

        let start = out.len();
        out.extend_from_slice(&self.physical_type.value().to_be_bytes());
        out.extend_from_slice(&self.codec.value().to_be_bytes());
        out.extend_from_slice(&self.value_count.to_be_bytes());
        out.extend_from_slice(&(body.len() as u64).to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out.len() - start)
    }

    /// Parse one chunk, decompressing its single data page.
    pub(crate) fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let physical_type = PhysicalType::from_value(reader.read_i32()?)?;
        let codec = CompressionCodec::from_value(reader.read_i32()?)?;
        let value_count = reader.read_u64()?;
        let total_size = reader.read_u64()? as usize;

        let body_start = reader.position();
        let compressor = compressor_for(codec)?;
        let mut pages = Vec::new();
        while reader.position() < body_start + total_size {
            pages.push(DataPage::read_from(reader, compressor.as_ref())?);
        }
        if reader.position() != body_start + total_size {
            return Err(Error::corrupt(format!(
                "column chunk body ended at {} instead of {}",
                reader.position(),
                body_start + total_size
            )));
        }

        Ok(Self {
            physical_type,
            codec,
            value_count,
            pages,
        })
    }

    /// Concatenated uncompressed payload of all pages.
    pub fn payload(&self) -> Vec<u8> {
        match self.pages.as_slice() {
            [single] => single.data().to_vec(),
            many => {
                let mut out = Vec::new();
                for page in many {
                    out.extend_from_slice(page.data());
                }
                out
            }
        }
    }
}
