//! JParque: a dual storage engine.
//!
//! Two engines share one record-store contract ([`StorageEngine`]): a
//! paged B+Tree in the BoltDB mold ([`BTreeEngine`]) for point-heavy
//! workloads, and a Parquet-shaped columnar store ([`ColumnStore`]) for
//! analytic data. A thin [`Table`] facade binds a named B+Tree file as a
//! row-oriented table.

pub use jparque_btree::BTreeEngine;
pub use jparque_columnar::{
    ColumnStore, CompressionCodec, MessageType, ParquetDeserializer, ParquetSerializer,
    SerializerConfig,
};
pub use jparque_result::{Error, Result};
pub use jparque_storage::{FieldMap, Record, StorageEngine, Value};
pub use jparque_table::Table;

pub mod btree {
    pub use jparque_btree::*;
}

pub mod columnar {
    pub use jparque_columnar::*;
}

pub mod storage {
    pub use jparque_storage::*;
}
