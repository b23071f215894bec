//! Tagged wire codec for field maps stored inline in B+Tree leaves.
//!
//! Wire format, all integers big-endian:
//!
//! ```text
//! [u32 count]
//! count x [u32 key_len][key utf-8][u8 tag][payload]
//! ```
//!
//! | tag | variant | payload                  |
//! |-----|---------|--------------------------|
//! | 0   | null    | -                        |
//! | 1   | int32   | 4 bytes                  |
//! | 2   | int64   | 8 bytes                  |
//! | 3   | float32 | 4 bytes                  |
//! | 4   | float64 | 8 bytes                  |
//! | 5   | bool    | 1 byte (0/1)             |
//! | 6   | string  | [u32 len][utf-8 bytes]   |
//!
//! Variants outside this table (`Bytes`, `List`) are coerced to their
//! string form under tag 6. Decoding is deliberately lenient: inline value
//! bytes can be truncated by earlier buggy writes, and the store prefers
//! availability over strictness at this one boundary, so malformed input
//! yields the partial map decoded so far.

use crate::types::{FieldMap, Value};

const TAG_NULL: u8 = 0;
const TAG_INT32: u8 = 1;
const TAG_INT64: u8 = 2;
const TAG_FLOAT32: u8 = 3;
const TAG_FLOAT64: u8 = 4;
const TAG_BOOL: u8 = 5;
const TAG_STRING: u8 = 6;

/// Encode a field map into the tagged byte stream.
pub fn encode_field_map(fields: &FieldMap) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + fields.len() * 16);
    out.extend_from_slice(&(fields.len() as u32).to_be_bytes());

    for (key, value) in fields {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key.as_bytes());
        encode_value(&mut out, value);
    }
    out
}

fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Int32(v) => {
            out.push(TAG_INT32);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Int64(v) => {
            out.push(TAG_INT64);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float32(v) => {
            out.push(TAG_FLOAT32);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float64(v) => {
            out.push(TAG_FLOAT64);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::Str(v) => encode_string(out, v),
        // Unsupported variants degrade to their string representation.
        other => encode_string(out, &other.to_string()),
    }
}

fn encode_string(out: &mut Vec<u8>, s: &str) {
    out.push(TAG_STRING);
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Decode a tagged byte stream back into a field map.
///
/// Never fails: entries are decoded until the input runs out or stops
/// making sense, and whatever was recovered up to that point is returned.
pub fn decode_field_map(bytes: &[u8]) -> FieldMap {
    let mut fields = FieldMap::default();
    let mut r = Reader::new(bytes);

    let Some(count) = r.read_u32() else {
        return fields;
    };
    // A well-formed entry needs at least 5 bytes; a count beyond that is
    // garbage from a truncated or overwritten buffer.
    if count as usize > bytes.len() / 5 + 1 {
        return fields;
    }

    for _ in 0..count {
        let Some(key_len) = r.read_u32() else {
            break;
        };
        let Some(key_bytes) = r.read_bytes(key_len as usize) else {
            break;
        };
        let Ok(key) = std::str::from_utf8(key_bytes) else {
            break;
        };
        let key = key.to_string();
        let Some(tag) = r.read_u8() else {
            break;
        };

        let value = match tag {
            TAG_NULL => Some(Value::Null),
            TAG_INT32 => r.read_array::<4>().map(|b| Value::Int32(i32::from_be_bytes(b))),
            TAG_INT64 => r.read_array::<8>().map(|b| Value::Int64(i64::from_be_bytes(b))),
            TAG_FLOAT32 => r
                .read_array::<4>()
                .map(|b| Value::Float32(f32::from_be_bytes(b))),
            TAG_FLOAT64 => r
                .read_array::<8>()
                .map(|b| Value::Float64(f64::from_be_bytes(b))),
            TAG_BOOL => r.read_u8().map(|b| Value::Bool(b != 0)),
            TAG_STRING => r.read_u32().and_then(|len| {
                r.read_bytes(len as usize)
                    .map(|b| Value::Str(String::from_utf8_lossy(b).into_owned()))
            }),
            _ => None,
        };

        match value {
            Some(v) => {
                fields.insert(key, v);
            }
            None => break,
        }
    }

    fields
}

/// Bounds-checked cursor over the input slice.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u8(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.read_array::<4>().map(u32::from_be_bytes)
    }

    fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let buf: &'a [u8] = self.buf;
        let end = self.pos.checked_add(len)?;
        let slice = buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Some(out)
    }
}
