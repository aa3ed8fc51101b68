//! Structured records: layouts, decoders, sources and lazy streams.

mod decoder;
mod resource;
mod schema;
mod source;
mod stream;
mod text;

pub use decoder::{Primitive, RecordData, RecordDecoder};
pub use resource::Resource;
pub use schema::{ByteOrder, Field, RecordSchema, RecordSchemaBuilder};
pub use source::{FixedSource, LineSource, RecordSource};
pub use stream::{
    BlockLayout, BlockStream, BoxedStream, KeyedStream, RecordFilter, RecordStream,
    SequenceStream,
};
pub use text::{TextKind, TextRecord, TextSchema, Transform};

use crate::error::Result;
use crate::model::Value;

/// A decoded record from either a binary or a text source.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Fixed-size binary record.
    Binary(RecordData),
    /// Parsed text line.
    Text(TextRecord),
}

impl Record {
    /// Value of a field.
    pub fn value(&self, name: &str) -> Result<Value> {
        match self {
            Record::Binary(data) => data.value(name),
            Record::Text(text) => text.get(name).cloned(),
        }
    }

    /// Field names in layout order.
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Record::Binary(data) => data.schema().fields().iter().map(Field::name).collect(),
            Record::Text(text) => text.iter().map(|(name, _)| name).collect(),
        }
    }

    /// The binary record, if this is one.
    pub fn as_binary(&self) -> Option<&RecordData> {
        match self {
            Record::Binary(data) => Some(data),
            Record::Text(_) => None,
        }
    }

    /// The text record, if this is one.
    pub fn as_text(&self) -> Option<&TextRecord> {
        match self {
            Record::Text(text) => Some(text),
            Record::Binary(_) => None,
        }
    }
}
