//! Shared storage-layer contract for the JParque engines.
//!
//! This crate owns the pieces both engines agree on: the [`StorageEngine`]
//! trait, the dynamic [`Value`] model for heterogeneous records, and the
//! tagged byte-stream codec used to store field maps inline in B+Tree
//! leaves.

pub mod serialization;
pub mod traits;
pub mod types;

pub use serialization::{decode_field_map, encode_field_map};
pub use traits::StorageEngine;
pub use types::{FieldMap, Record, Value};
