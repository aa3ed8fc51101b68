//! Error types for cdmkit.
//!
//! This module provides a unified error handling approach using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cdmkit operations.
pub type Result<T> = std::result::Result<T, CdmError>;

/// Errors that can occur in cdmkit.
#[derive(Debug, Error)]
pub enum CdmError {
    /// A dimension string contained a token that is neither a name, `*`, nor a length.
    #[error("Malformed dimension token '{token}' in \"{spec}\"")]
    MalformedDimension { token: String, spec: String },

    /// A shared dimension name could not be resolved from the given scope.
    #[error("Dimension '{name}' does not exist in scope '{scope}' or its ancestors")]
    UnknownDimension { name: String, scope: String },

    /// An entity with the same name already exists among its siblings.
    #[error("{kind} '{name}' already exists in scope '{scope}'")]
    DuplicateName {
        kind: &'static str,
        name: String,
        scope: String,
    },

    /// Only shared dimensions can be declared on a scope.
    #[error("Dimension added to scope '{scope}' must be shared and named")]
    NotShared { scope: String },

    /// A dimension is still referenced by a variable.
    #[error("Dimension '{name}' is still referenced by variable '{variable}'")]
    DimensionInUse { name: String, variable: String },

    /// A builder was used after `build()`.
    #[error("Builder for '{name}' was already built")]
    AlreadyBuilt { name: String },

    /// A record schema is internally inconsistent.
    #[error("Invalid record schema: {0}")]
    InvalidSchema(String),

    /// A field is not part of the schema.
    #[error("Field not found: {name}")]
    FieldNotFound { name: String },

    /// A field was read as the wrong primitive type.
    #[error("Field '{field}' holds {actual}, not {requested}")]
    TypeMismatch {
        field: String,
        actual: String,
        requested: String,
    },

    /// Record index past the end of a decoded buffer.
    #[error("Record {index} out of bounds ({len} records)")]
    RecordOutOfBounds { index: usize, len: usize },

    /// A text column could not be parsed.
    #[error("Cannot parse field '{field}' from \"{text}\"")]
    Parse { field: String, text: String },

    /// A stream method was called out of order.
    #[error("Invalid stream state: {0}")]
    StreamState(&'static str),

    /// The backing resource was closed while a stream was still in use.
    #[error("Resource closed: {path}")]
    ResourceClosed { path: PathBuf },

    /// The resource ended before the expected number of records.
    #[error("Unexpected end of data: expected {expected} records, got {found}")]
    UnexpectedEof { expected: u64, found: u64 },

    /// An index file could not be decoded.
    #[error("Index format error: {0}")]
    IndexFormat(String),

    /// Failed to open a file.
    #[error("Failed to open file: {path}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No registered decoder recognises the file.
    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// A named entity was not found in a dataset.
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Failed to read a netCDF file.
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCDF(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CdmError {
    /// Create a FileOpen error.
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// Create a DuplicateName error.
    pub fn duplicate(kind: &'static str, name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Create a FieldNotFound error.
    pub fn field_not_found(name: impl Into<String>) -> Self {
        Self::FieldNotFound { name: name.into() }
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a Parse error.
    pub fn parse(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Whether this error reports a misconfigured model or schema.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MalformedDimension { .. }
                | Self::UnknownDimension { .. }
                | Self::DuplicateName { .. }
                | Self::NotShared { .. }
                | Self::InvalidSchema(_)
                | Self::FieldNotFound { .. }
                | Self::TypeMismatch { .. }
        )
    }
}

#[cfg(feature = "netcdf")]
impl From<netcdf::Error> for CdmError {
    fn from(err: netcdf::Error) -> Self {
        Self::NetCDF(err.to_string())
    }
}
