//! Core record types shared by both storage engines.

use rustc_hash::FxHashMap;
use std::fmt;

/// A dynamically typed field value.
///
/// The first seven variants are the wire-codec variants (see
/// [`crate::serialization`]); `Bytes` and `List` exist for the columnar
/// side, where BINARY fields without a UTF8 annotation decode to raw bytes
/// and repeated fields decode to lists. The inline codec coerces those two
/// to their string representation at encode time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    /// True for the `Null` variant.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            Value::List(vs) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// A record's field map: field name to tagged value.
pub type FieldMap = FxHashMap<String, Value>;

/// A `(key, field map)` pair as produced by scans and consumed by batch
/// writes. Keys are opaque byte sequences ordered by unsigned byte
/// comparison — which is exactly what `<[u8]>::cmp` provides.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Vec<u8>,
    pub fields: FieldMap,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, fields: FieldMap) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }
}
