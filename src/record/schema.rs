//! Fixed binary record layouts.

use crate::error::{CdmError, Result};
use crate::model::DataType;
use std::collections::HashMap;

/// Byte order of multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Most significant byte first.
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

/// One field of a fixed-size record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    data_type: DataType,
    offset: usize,
    count: usize,
}

impl Field {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Byte offset from the start of the record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Size in bytes of the whole field.
    pub fn size(&self) -> usize {
        // Validated at build time: only fixed-size types are accepted.
        self.data_type.size().unwrap_or(0) * self.count
    }
}

/// Ordered named fields over a fixed-size record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    fields: Vec<Field>,
    lookup: HashMap<String, usize>,
    record_size: usize,
    byte_order: ByteOrder,
}

impl RecordSchema {
    /// Start a schema with the given byte order.
    pub fn builder(byte_order: ByteOrder) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            fields: Vec::new(),
            record_size: None,
            byte_order,
        }
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.lookup
            .get(name)
            .map(|i| &self.fields[*i])
            .ok_or_else(|| CdmError::field_not_found(name))
    }

    /// Size in bytes of one record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Byte order of multi-byte fields.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}

/// Builder for [`RecordSchema`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RecordSchemaBuilder {
    fields: Vec<Field>,
    record_size: Option<usize>,
    byte_order: ByteOrder,
}

impl RecordSchemaBuilder {
    /// Add a scalar field at `offset`.
    pub fn field(self, name: impl Into<String>, data_type: DataType, offset: usize) -> Self {
        self.array(name, data_type, offset, 1)
    }

    /// Add a field of `count` consecutive elements at `offset`.
    pub fn array(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        offset: usize,
        count: usize,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            data_type,
            offset,
            count,
        });
        self
    }

    /// Declare the record size explicitly, for layouts with trailing padding.
    pub fn record_size(mut self, size: usize) -> Self {
        self.record_size = Some(size);
        self
    }

    /// Validate and freeze the layout.
    pub fn build(self) -> Result<RecordSchema> {
        let mut lookup = HashMap::with_capacity(self.fields.len());
        let mut extent = 0;
        for (i, f) in self.fields.iter().enumerate() {
            let Some(size) = f.data_type.size() else {
                return Err(CdmError::InvalidSchema(format!(
                    "field '{}' has variable-size type {}",
                    f.name, f.data_type
                )));
            };
            if f.count == 0 {
                return Err(CdmError::InvalidSchema(format!(
                    "field '{}' has zero elements",
                    f.name
                )));
            }
            if lookup.insert(f.name.clone(), i).is_some() {
                return Err(CdmError::InvalidSchema(format!(
                    "duplicate field '{}'",
                    f.name
                )));
            }
            extent = extent.max(f.offset + size * f.count);
        }
        let record_size = self.record_size.unwrap_or(extent);
        if record_size == 0 {
            return Err(CdmError::InvalidSchema("record size is zero".into()));
        }
        if record_size < extent {
            return Err(CdmError::InvalidSchema(format!(
                "record size {} is smaller than field extent {}",
                record_size, extent
            )));
        }
        Ok(RecordSchema {
            fields: self.fields,
            lookup,
            record_size,
            byte_order: self.byte_order,
        })
    }
}
