//! Parquet-shaped columnar codec and the keyed store built on it.
//!
//! The on-disk layout follows the Parquet file idiom: a magic-framed file
//! of row groups, each holding one compressed column chunk per schema
//! field, with a schema-carrying metadata block located through a trailing
//! offset. [`ParquetSerializer`] and [`ParquetDeserializer`] are exactly
//! symmetric; [`ColumnStore`] layers point-key semantics on top by keeping
//! an in-memory record cache and rewriting the file on change.

mod cursor;

pub mod chunk;
pub mod compression;
pub mod deserializer;
pub mod metadata;
pub mod page;
pub mod rowgroup;
pub mod schema;
pub mod serializer;
pub mod store;

pub use chunk::ColumnChunk;
pub use compression::{compressor_for, CompressionCodec, Compressor};
pub use deserializer::ParquetDeserializer;
pub use metadata::{FileMetadata, RowGroupMeta};
pub use page::{DataPage, Encoding, PageType, Statistics};
pub use rowgroup::RowGroup;
pub use schema::{Field, LogicalType, MessageType, MessageTypeBuilder, PhysicalType, Repetition};
pub use serializer::{ParquetSerializer, SerializerConfig};
pub use store::ColumnStore;

/// Magic bytes framing every file: present right after open and right
/// before EOF.
pub const PARQUET_MAGIC: [u8; 4] = *b"PAR1";
