//! Data pages: the smallest unit of columnar storage.

use crate::compression::Compressor;
use crate::cursor::ByteReader;
use jparque_result::{Error, Result};

/// Page kinds in the file format. Only data pages are written today; the
/// other tags exist so readers can identify foreign pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    DataPage,
    IndexPage,
    DictionaryPage,
    DataPageV2,
}

impl PageType {
    pub fn value(self) -> u8 {
        match self {
            PageType::DataPage => 0,
            PageType::IndexPage => 1,
            PageType::DictionaryPage => 2,
            PageType::DataPageV2 => 3,
        }
    }

    pub fn from_value(value: u8) -> Result<Self> {
        Ok(match value {
            0 => PageType::DataPage,
            1 => PageType::IndexPage,
            2 => PageType::DictionaryPage,
            3 => PageType::DataPageV2,
            other => return Err(Error::corrupt(format!("unknown page type tag {other}"))),
        })
    }
}

/// Value encodings. Column payloads are written PLAIN; the remaining tags
/// mirror the format family for interoperability of the header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Dictionary,
    Rle,
    BitPacked,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
}

impl Encoding {
    pub fn value(self) -> i32 {
        match self {
            Encoding::Plain => 0,
            Encoding::Dictionary => 2,
            Encoding::Rle => 3,
            Encoding::BitPacked => 4,
            Encoding::DeltaBinaryPacked => 5,
            Encoding::DeltaLengthByteArray => 6,
            Encoding::DeltaByteArray => 7,
            Encoding::RleDictionary => 8,
        }
    }

    pub fn from_value(value: i32) -> Result<Self> {
        Ok(match value {
            0 => Encoding::Plain,
            2 => Encoding::Dictionary,
            3 => Encoding::Rle,
            4 => Encoding::BitPacked,
            5 => Encoding::DeltaBinaryPacked,
            6 => Encoding::DeltaLengthByteArray,
            7 => Encoding::DeltaByteArray,
            8 => Encoding::RleDictionary,
            other => return Err(Error::corrupt(format!("unknown encoding tag {other}"))),
        })
    }
}

/// Per-page statistics: min/max over the page's single-value encodings,
/// plus null and distinct counts.
///
/// Layout: `[u32 min_len][min][u32 max_len][max][u64 null_count]
/// [u64 distinct_count]`. A zero length stands for "no value" (empty
/// pages).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub min: Vec<u8>,
    pub max: Vec<u8>,
    pub null_count: u64,
    pub distinct_count: u64,
}

impl Statistics {
    pub fn encoded_len(&self) -> usize {
        4 + self.min.len() + 4 + self.max.len() + 8 + 8
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.min.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.min);
        out.extend_from_slice(&(self.max.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.max);
        out.extend_from_slice(&self.null_count.to_be_bytes());
        out.extend_from_slice(&self.distinct_count.to_be_bytes());
    }

    pub(crate) fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let min = reader.read_len_prefixed()?.to_vec();
        let max = reader.read_len_prefixed()?.to_vec();
        let null_count = reader.read_u64()?;
        let distinct_count = reader.read_u64()?;
        Ok(Self {
            min,
            max,
            null_count,
            distinct_count,
        })
    }

    /// Fold one encoded value into the running min/max.
    pub(crate) fn observe(&mut self, encoded: &[u8]) {
        if self.min.is_empty() || encoded < self.min.as_slice() {
            self.min = encoded.to_vec();
        }
        if self.max.is_empty() || encoded > self.max.as_slice() {
            self.max = encoded.to_vec();
        }
    }
}

/// A data page assembled in memory, ready to lay itself down on a sink.
///
/// Header layout: `[u8 page_type][u32 uncompressed][u32 compressed]
/// [u32 value_count][u32 encoding][u32 def_level_encoding]
/// [u32 rep_level_encoding][statistics]`, followed by the compressed
/// payload.
#[derive(Debug, Clone)]
pub struct DataPage {
    data: Vec<u8>,
    value_count: u32,
    encoding: Encoding,
    definition_level_encoding: Encoding,
    repetition_level_encoding: Encoding,
    statistics: Statistics,
}

impl DataPage {
    pub fn new(data: Vec<u8>, value_count: u32, statistics: Statistics) -> Self {
        Self {
            data,
            value_count,
            encoding: Encoding::Plain,
            definition_level_encoding: Encoding::Rle,
            repetition_level_encoding: Encoding::Rle,
            statistics,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn value_count(&self) -> u32 {
        self.value_count
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn uncompressed_size(&self) -> usize {
        self.data.len()
    }

    pub fn header_len(&self) -> usize {
        1 + 4 + 4 + 4 + 4 + 4 + 4 + self.statistics.encoded_len()
    }

    /// Compress the payload and append header plus payload to `out`.
    /// Returns the number of bytes written.
    pub fn write_to(&self, out: &mut Vec<u8>, compressor: &dyn Compressor) -> Result<usize> {
        let compressed = compressor.compress(&self.data)?;
        let start = out.len();

        out.push(PageType::DataPage.value());
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.value_count.to_be_bytes());
        out.extend_from_slice(&self.encoding.value().to_be_bytes());
        out.extend_from_slice(&self.definition_level_encoding.value().to_be_bytes());
        out.extend_from_slice(&self.repetition_level_encoding.value().to_be_bytes());
        self.statistics.write_to(out);
        out.extend_from_slice(&compressed);

        Ok(out.len() - start)
    }

    /// Parse a page header and payload, decompressing back to the
    /// original bytes.
    pub(crate) fn read_from(
        reader: &mut ByteReader<'_>,
        compressor: &dyn Compressor,
    ) -> Result<Self> {
        let tag = PageType::from_value(reader.read_u8()?)?;
        if tag != PageType::DataPage {
            return Err(Error::corrupt(format!(
                "expected a data page, found {tag:?}"
            )));
        }
        let uncompressed = reader.read_u32()? as usize;
        let compressed = reader.read_u32()? as usize;
        let value_count = reader.read_u32()?;
        let encoding = Encoding::from_value(reader.read_i32()?)?;
        let definition_level_encoding = Encoding::from_value(reader.read_i32()?)?;
        let repetition_level_encoding = Encoding::from_value(reader.read_i32()?)?;
        let statistics = Statistics::read_from(reader)?;

        let payload = reader.read_bytes(compressed)?;
        let data = compressor.decompress(payload, uncompressed)?;

        Ok(Self {
            data,
            value_count,
            encoding,
            definition_level_encoding,
            repetition_level_encoding,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{compressor_for, CompressionCodec};

    #[test]
    fn page_round_trips_through_bytes() {
        let mut stats = Statistics::default();
        for chunk in [b"aaa".as_slice(), b"zzz", b"mmm"] {
            stats.observe(chunk);
        }
        stats.null_count = 2;
        stats.distinct_count = 3;

        let payload: Vec<u8> = (0..500u32).flat_map(|i| i.to_be_bytes()).collect();
        let page = DataPage::new(payload.clone(), 500, stats.clone());

        for codec in [CompressionCodec::Uncompressed, CompressionCodec::Snappy] {
            let compressor = compressor_for(codec).unwrap();
            let mut out = Vec::new();
            let written = page.write_to(&mut out, compressor.as_ref()).unwrap();
            assert_eq!(written, out.len());

            let mut reader = ByteReader::new(&out);
            let parsed = DataPage::read_from(&mut reader, compressor.as_ref()).unwrap();
            assert_eq!(parsed.data(), payload.as_slice());
            assert_eq!(parsed.value_count(), 500);
            assert_eq!(parsed.statistics(), &stats);
        }
    }

    #[test]
    fn statistics_track_min_and_max() {
        let mut stats = Statistics::default();
        stats.observe(b"banana");
        stats.observe(b"apple");
        stats.observe(b"cherry");
        assert_eq!(stats.min, b"apple");
        assert_eq!(stats.max, b"cherry");
    }

    #[test]
    fn foreign_page_type_is_rejected() {
        let compressor = compressor_for(CompressionCodec::Uncompressed).unwrap();
        let bytes = [PageType::DictionaryPage.value(); 64];
        let mut reader = ByteReader::new(&bytes);
        assert!(DataPage::read_from(&mut reader, compressor.as_ref()).is_err());
    }
}
