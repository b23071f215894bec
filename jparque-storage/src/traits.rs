//! The public contract every storage engine provides.

use crate::types::{FieldMap, Record};
use jparque_result::Result;

/// Common record-store interface implemented by the B+Tree engine and the
/// columnar store.
///
/// Keys are opaque byte strings compared as unsigned bytes. Operations are
/// single-threaded per handle; there are no visibility guarantees across
/// handles open on the same file.
pub trait StorageEngine {
    /// Write one record, replacing any previous value under `key`.
    fn write(&mut self, key: &[u8], value: FieldMap) -> Result<()>;

    /// Write a batch of records. An empty batch leaves the store untouched.
    fn write_batch(&mut self, records: Vec<Record>) -> Result<()>;

    /// Read the record under `key`. Missing keys are `Ok(None)`, not an
    /// error.
    fn read(&mut self, key: &[u8]) -> Result<Option<FieldMap>>;

    /// Range scan ordered by key, optionally projected to `columns`.
    ///
    /// `end_key == None` scans to the end of the store. The end-bound
    /// convention differs per engine and is documented on each
    /// implementation: the B+Tree treats `end_key` as inclusive, the
    /// columnar store as exclusive.
    fn scan(
        &mut self,
        start_key: &[u8],
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<Record>>;

    /// Delete the record under `key`. Deleting a missing key is a no-op.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Flush and release resources. Idempotent.
    fn close(&mut self) -> Result<()>;
}
