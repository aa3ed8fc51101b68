//! One index entry and its tagged binary encoding.
//!
//! Each field is written as a varint tag `(field << 3) | wire_type` followed
//! by its value. Wire type 0 is a varint, wire type 2 is a length-prefixed
//! byte string. Unknown fields are skipped on decode so newer writers stay
//! readable.

use super::varint::{decode_varint, encode_varint};
use crate::error::{CdmError, Result};

const WIRE_VARINT: u64 = 0;
const WIRE_BYTES: u64 = 2;

const FIELD_KEY: u64 = 1;
const FIELD_OFFSET: u64 = 2;
const FIELD_COUNT: u64 = 3;
const FIELD_CATALOG: u64 = 4;
const FIELD_NON_CONTIGUOUS: u64 = 5;

/// Where the records of one key live in the primary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Key shared by the records.
    pub key: String,
    /// Byte offset of the first record.
    pub offset: u64,
    /// Number of records with this key.
    pub count: u64,
    /// Offset of the key's row in a companion catalog file.
    pub catalog_offset: Option<u64>,
    /// False when the key's records are not all adjacent.
    pub contiguous: bool,
}

impl IndexEntry {
    /// Create a contiguous entry for one record at `offset`.
    pub fn new(key: impl Into<String>, offset: u64) -> Self {
        Self {
            key: key.into(),
            offset,
            count: 1,
            catalog_offset: None,
            contiguous: true,
        }
    }

    /// Encode as tagged fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.key.len() + 16);
        put_tag(&mut buf, FIELD_KEY, WIRE_BYTES);
        encode_varint(self.key.len() as u64, &mut buf);
        buf.extend_from_slice(self.key.as_bytes());
        put_tag(&mut buf, FIELD_OFFSET, WIRE_VARINT);
        encode_varint(self.offset, &mut buf);
        put_tag(&mut buf, FIELD_COUNT, WIRE_VARINT);
        encode_varint(self.count, &mut buf);
        if let Some(catalog) = self.catalog_offset {
            put_tag(&mut buf, FIELD_CATALOG, WIRE_VARINT);
            encode_varint(catalog, &mut buf);
        }
        if !self.contiguous {
            put_tag(&mut buf, FIELD_NON_CONTIGUOUS, WIRE_VARINT);
            encode_varint(1, &mut buf);
        }
        buf
    }

    /// Decode from tagged fields. Key, offset and count are required.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut key = None;
        let mut offset = None;
        let mut count = None;
        let mut catalog_offset = None;
        let mut contiguous = true;

        let mut pos = 0;
        while pos < buf.len() {
            let tag = decode_varint(buf, &mut pos)?;
            let (field, wire) = (tag >> 3, tag & 0x7);
            match (field, wire) {
                (FIELD_KEY, WIRE_BYTES) => {
                    let bytes = read_bytes(buf, &mut pos)?;
                    let text = std::str::from_utf8(bytes)
                        .map_err(|_| CdmError::IndexFormat("key is not UTF-8".into()))?;
                    key = Some(text.to_string());
                },
                (FIELD_OFFSET, WIRE_VARINT) => offset = Some(decode_varint(buf, &mut pos)?),
                (FIELD_COUNT, WIRE_VARINT) => count = Some(decode_varint(buf, &mut pos)?),
                (FIELD_CATALOG, WIRE_VARINT) => catalog_offset = Some(decode_varint(buf, &mut pos)?),
                (FIELD_NON_CONTIGUOUS, WIRE_VARINT) => {
                    contiguous = decode_varint(buf, &mut pos)? == 0;
                },
                (_, WIRE_VARINT) => {
                    decode_varint(buf, &mut pos)?;
                },
                (_, WIRE_BYTES) => {
                    read_bytes(buf, &mut pos)?;
                },
                (_, other) => {
                    return Err(CdmError::IndexFormat(format!(
                        "unsupported wire type {} for field {}",
                        other, field
                    )));
                },
            }
        }

        let missing = |name: &str| CdmError::IndexFormat(format!("entry without {}", name));
        Ok(Self {
            key: key.ok_or_else(|| missing("key"))?,
            offset: offset.ok_or_else(|| missing("offset"))?,
            count: count.ok_or_else(|| missing("count"))?,
            catalog_offset,
            contiguous,
        })
    }
}

fn put_tag(buf: &mut Vec<u8>, field: u64, wire: u64) {
    encode_varint((field << 3) | wire, buf);
}

fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = decode_varint(buf, pos)? as usize;
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| CdmError::IndexFormat("length past end of entry".into()))?;
    let bytes = &buf[*pos..end];
    *pos = end;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_survive() {
        let entry = IndexEntry {
            key: "42500".into(),
            offset: 1 << 40,
            count: 3,
            catalog_offset: Some(107),
            contiguous: false,
        };
        assert_eq!(IndexEntry::decode(&entry.encode()).unwrap(), entry);

        let plain = IndexEntry::new("A", 0);
        assert_eq!(IndexEntry::decode(&plain.encode()).unwrap(), plain);
    }

    #[test]
    fn test_unknown_fields_skipped() {
        let mut buf = IndexEntry::new("K", 9).encode();
        put_tag(&mut buf, 14, WIRE_VARINT);
        encode_varint(12345, &mut buf);
        put_tag(&mut buf, 15, WIRE_BYTES);
        encode_varint(3, &mut buf);
        buf.extend_from_slice(b"xyz");
        let entry = IndexEntry::decode(&buf).unwrap();
        assert_eq!(entry.key, "K");
        assert_eq!(entry.offset, 9);
    }

    #[test]
    fn test_corrupt_entries_rejected() {
        let good = IndexEntry::new("KEY", 5).encode();
        assert!(IndexEntry::decode(&good[..3]).is_err());

        let mut no_count = Vec::new();
        put_tag(&mut no_count, FIELD_KEY, WIRE_BYTES);
        encode_varint(1, &mut no_count);
        no_count.push(b'x');
        assert!(matches!(
            IndexEntry::decode(&no_count),
            Err(CdmError::IndexFormat(_))
        ));

        let mut bad_wire = Vec::new();
        put_tag(&mut bad_wire, 9, 5);
        assert!(IndexEntry::decode(&bad_wire).is_err());
    }
}
