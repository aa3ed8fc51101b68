//! Typed scalar and array values shared by attributes and decoded records.

use std::fmt;

/// Element type of a variable, attribute or record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Signed 8-bit integer.
    Byte,
    /// Unsigned 8-bit integer.
    UByte,
    /// Signed 16-bit integer.
    Short,
    /// Unsigned 16-bit integer.
    UShort,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// Signed 64-bit integer.
    Long,
    /// Unsigned 64-bit integer.
    ULong,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// Single 8-bit character.
    Char,
    /// Variable-length string.
    String,
    /// Fixed set of member variables.
    Structure,
    /// Structure whose instance count is discovered by iteration.
    Sequence,
}

impl DataType {
    /// Size in bytes of one element, or `None` for variable-size types.
    pub fn size(self) -> Option<usize> {
        match self {
            DataType::Byte | DataType::UByte | DataType::Char => Some(1),
            DataType::Short | DataType::UShort => Some(2),
            DataType::Int | DataType::UInt | DataType::Float => Some(4),
            DataType::Long | DataType::ULong | DataType::Double => Some(8),
            DataType::String | DataType::Structure | DataType::Sequence => None,
        }
    }

    /// Check if this is a numeric type.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            DataType::Char | DataType::String | DataType::Structure | DataType::Sequence
        )
    }

    /// Check if this type holds member variables.
    pub fn is_structure(self) -> bool {
        matches!(self, DataType::Structure | DataType::Sequence)
    }

    /// Lower-case type name.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Byte => "byte",
            DataType::UByte => "ubyte",
            DataType::Short => "short",
            DataType::UShort => "ushort",
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Long => "long",
            DataType::ULong => "ulong",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Char => "char",
            DataType::String => "string",
            DataType::Structure => "structure",
            DataType::Sequence => "sequence",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value, or an array of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed 8-bit integer.
    Byte(i8),
    /// Unsigned 8-bit integer.
    UByte(u8),
    /// Signed 16-bit integer.
    Short(i16),
    /// Unsigned 16-bit integer.
    UShort(u16),
    /// Signed 32-bit integer.
    Int(i32),
    /// Unsigned 32-bit integer.
    UInt(u32),
    /// Signed 64-bit integer.
    Long(i64),
    /// Unsigned 64-bit integer.
    ULong(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Single character.
    Char(char),
    /// Text.
    Text(String),
    /// Homogeneous array of values.
    Array(Vec<Value>),
}

impl Value {
    /// The element type of this value (arrays report their first element).
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Byte(_) => DataType::Byte,
            Value::UByte(_) => DataType::UByte,
            Value::Short(_) => DataType::Short,
            Value::UShort(_) => DataType::UShort,
            Value::Int(_) => DataType::Int,
            Value::UInt(_) => DataType::UInt,
            Value::Long(_) => DataType::Long,
            Value::ULong(_) => DataType::ULong,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Char(_) => DataType::Char,
            Value::Text(_) => DataType::String,
            Value::Array(items) => items.first().map_or(DataType::Double, Value::data_type),
        }
    }

    /// Numeric value widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Byte(v) => Some(v as f64),
            Value::UByte(v) => Some(v as f64),
            Value::Short(v) => Some(v as f64),
            Value::UShort(v) => Some(v as f64),
            Value::Int(v) => Some(v as f64),
            Value::UInt(v) => Some(v as f64),
            Value::Long(v) => Some(v as f64),
            Value::ULong(v) => Some(v as f64),
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Integral value widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(v as i64),
            Value::UByte(v) => Some(v as i64),
            Value::Short(v) => Some(v as i64),
            Value::UShort(v) => Some(v as i64),
            Value::Int(v) => Some(v as i64),
            Value::UInt(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            Value::ULong(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Borrow the text of a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this is a text value.
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Elements of an array value, or the value itself as a single element.
    pub fn elements(&self) -> &[Value] {
        match self {
            Value::Array(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{}", v),
            Value::UByte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::UShort(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::ULong(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Char(c) => write!(f, "{}", c),
            Value::Text(s) => f.write_str(s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            },
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
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
    char => Char,
    String => Text,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}
