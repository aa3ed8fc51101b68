//! Persisted secondary indices for random access by key.
//!
//! An index is built by scanning the primary file once, written next to it
//! (`<file>.cdmx` by default) and reused while it stays valid and fresh.

mod entry;
mod secondary;
pub mod varint;

pub use entry::IndexEntry;
pub use secondary::{IndexBuilder, SecondaryIndex, INDEX_MAGIC, INDEX_VERSION};
