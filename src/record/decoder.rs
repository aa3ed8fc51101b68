//! Zero-copy field access over buffers of fixed-size records.

use super::schema::{ByteOrder, Field, RecordSchema};
use crate::error::{CdmError, Result};
use crate::model::{DataType, Value};
use bytes::Bytes;
use std::sync::Arc;

/// A fixed-size primitive that can be read from raw record bytes.
pub trait Primitive: Sized + Copy {
    /// Stored type this primitive corresponds to.
    const DATA_TYPE: DataType;

    /// Decode from exactly `size_of::<Self>()` bytes.
    fn from_bytes(bytes: &[u8], order: ByteOrder) -> Self;
}

macro_rules! primitive {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const DATA_TYPE: DataType = DataType::$dt;

                fn from_bytes(bytes: &[u8], order: ByteOrder) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                    match order {
                        ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                        ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                    }
                }
            }
        )*
    };
}

primitive! {
    i8 => Byte,
    u8 => UByte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
}

fn element_value(field: &Field, bytes: &[u8], order: ByteOrder) -> Value {
    match field.data_type() {
        DataType::Byte => Value::Byte(i8::from_bytes(bytes, order)),
        DataType::UByte => Value::UByte(u8::from_bytes(bytes, order)),
        DataType::Short => Value::Short(i16::from_bytes(bytes, order)),
        DataType::UShort => Value::UShort(u16::from_bytes(bytes, order)),
        DataType::Int => Value::Int(i32::from_bytes(bytes, order)),
        DataType::UInt => Value::UInt(u32::from_bytes(bytes, order)),
        DataType::Long => Value::Long(i64::from_bytes(bytes, order)),
        DataType::ULong => Value::ULong(u64::from_bytes(bytes, order)),
        DataType::Float => Value::Float(f32::from_bytes(bytes, order)),
        DataType::Double => Value::Double(f64::from_bytes(bytes, order)),
        DataType::Char => Value::Char(char::from(bytes[0])),
        // Rejected by RecordSchemaBuilder::build.
        DataType::String | DataType::Structure | DataType::Sequence => Value::Array(Vec::new()),
    }
}

/// One record: a slice of the decoder's buffer plus its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordData {
    schema: Arc<RecordSchema>,
    bytes: Bytes,
}

impl RecordData {
    /// Wrap one record's bytes. The slice must be exactly one record long.
    pub fn new(schema: Arc<RecordSchema>, bytes: Bytes) -> Result<Self> {
        if bytes.len() != schema.record_size() {
            return Err(CdmError::InvalidSchema(format!(
                "record holds {} bytes, layout needs {}",
                bytes.len(),
                schema.record_size()
            )));
        }
        Ok(Self { schema, bytes })
    }

    /// Layout of this record.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Raw bytes of the whole record.
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Raw bytes of one field, sharing the underlying buffer.
    pub fn raw(&self, name: &str) -> Result<Bytes> {
        let field = self.schema.field(name)?;
        Ok(self
            .bytes
            .slice(field.offset()..field.offset() + field.size()))
    }

    /// Read the first element of a field as `T`, which must match its stored type.
    pub fn get<T: Primitive>(&self, name: &str) -> Result<T> {
        let field = self.schema.field(name)?;
        if field.data_type() != T::DATA_TYPE {
            return Err(CdmError::TypeMismatch {
                field: name.to_string(),
                actual: field.data_type().to_string(),
                requested: T::DATA_TYPE.to_string(),
            });
        }
        Ok(T::from_bytes(
            &self.bytes[field.offset()..],
            self.schema.byte_order(),
        ))
    }

    /// Read a field as a [`Value`]. Multi-element char fields become text with
    /// trailing NULs and spaces removed; other multi-element fields become arrays.
    pub fn value(&self, name: &str) -> Result<Value> {
        let field = self.schema.field(name)?;
        let raw = &self.bytes[field.offset()..field.offset() + field.size()];
        if field.count() == 1 {
            return Ok(element_value(field, raw, self.schema.byte_order()));
        }
        if field.data_type() == DataType::Char {
            let text = String::from_utf8_lossy(raw);
            return Ok(Value::Text(
                text.trim_end_matches(['\0', ' ']).to_string(),
            ));
        }
        let width = raw.len() / field.count();
        Ok(Value::Array(
            raw.chunks_exact(width)
                .map(|chunk| element_value(field, chunk, self.schema.byte_order()))
                .collect(),
        ))
    }
}

/// Reads fields of N consecutive fixed-size records held in one buffer.
///
/// Field F of record i lives at `i * record_size + offset(F)`; every access is
/// constant time and slices share the original buffer.
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    schema: Arc<RecordSchema>,
    buffer: Bytes,
    len: usize,
}

impl RecordDecoder {
    /// Create a decoder. Trailing bytes that do not fill a record are ignored.
    pub fn new(schema: Arc<RecordSchema>, buffer: Bytes) -> Self {
        let len = buffer.len() / schema.record_size();
        Self {
            schema,
            buffer,
            len,
        }
    }

    /// Number of complete records in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no complete record.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Layout shared by all records.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Byte offset of record `index` within the buffer.
    pub fn base(&self, index: usize) -> usize {
        index * self.schema.record_size()
    }

    /// Record `index` as a zero-copy slice.
    pub fn record(&self, index: usize) -> Result<RecordData> {
        self.check(index)?;
        let base = self.base(index);
        Ok(RecordData {
            schema: Arc::clone(&self.schema),
            bytes: self.buffer.slice(base..base + self.schema.record_size()),
        })
    }

    /// Raw bytes of field `name` in record `index`.
    pub fn raw_field(&self, index: usize, name: &str) -> Result<Bytes> {
        self.check(index)?;
        let field = self.schema.field(name)?;
        let start = self.base(index) + field.offset();
        Ok(self.buffer.slice(start..start + field.size()))
    }

    /// Typed read of field `name` in record `index`.
    pub fn read<T: Primitive>(&self, index: usize, name: &str) -> Result<T> {
        self.record(index)?.get(name)
    }

    /// Iterate over all records.
    pub fn records(&self) -> impl Iterator<Item = RecordData> + '_ {
        (0..self.len).filter_map(move |i| self.record(i).ok())
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(CdmError::RecordOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<RecordSchema> {
        Arc::new(
            RecordSchema::builder(ByteOrder::BigEndian)
                .field("id", DataType::UShort, 0)
                .field("temp", DataType::Float, 2)
                .array("tag", DataType::Char, 6, 4)
                .array("flags", DataType::UByte, 10, 2)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_field_bytes_match_pattern() {
        let schema = schema();
        let buffer: Vec<u8> = (0..schema.record_size() as u8 * 3).collect();
        let decoder = RecordDecoder::new(Arc::clone(&schema), Bytes::from(buffer.clone()));
        assert_eq!(decoder.len(), 3);
        for i in 0..decoder.len() {
            for field in schema.fields() {
                let raw = decoder.raw_field(i, field.name()).unwrap();
                let start = decoder.base(i) + field.offset();
                assert_eq!(&raw[..], &buffer[start..start + field.size()]);
            }
        }
    }

    #[test]
    fn test_typed_reads() {
        let mut rec = Vec::new();
        rec.extend_from_slice(&513u16.to_be_bytes());
        rec.extend_from_slice(&1.5f32.to_be_bytes());
        rec.extend_from_slice(b"AB\0\0");
        rec.extend_from_slice(&[7, 9]);
        let decoder = RecordDecoder::new(schema(), Bytes::from(rec));
        assert_eq!(decoder.read::<u16>(0, "id").unwrap(), 513);
        assert_eq!(decoder.read::<f32>(0, "temp").unwrap(), 1.5);
        let record = decoder.record(0).unwrap();
        assert_eq!(record.value("tag").unwrap(), Value::Text("AB".into()));
        assert_eq!(
            record.value("flags").unwrap(),
            Value::Array(vec![Value::UByte(7), Value::UByte(9)])
        );
    }

    #[test]
    fn test_little_endian() {
        let schema = Arc::new(
            RecordSchema::builder(ByteOrder::LittleEndian)
                .field("n", DataType::Int, 0)
                .build()
                .unwrap(),
        );
        let decoder = RecordDecoder::new(schema, Bytes::from((-2i32).to_le_bytes().to_vec()));
        assert_eq!(decoder.read::<i32>(0, "n").unwrap(), -2);
    }

    #[test]
    fn test_errors() {
        let decoder = RecordDecoder::new(schema(), Bytes::from(vec![0u8; 13]));
        assert_eq!(decoder.len(), 1);
        assert!(matches!(
            decoder.record(1),
            Err(CdmError::RecordOutOfBounds { index: 1, len: 1 })
        ));
        assert!(matches!(
            decoder.read::<i32>(0, "id"),
            Err(CdmError::TypeMismatch { .. })
        ));
        assert!(decoder.read::<u16>(0, "nope").is_err());
    }
}
