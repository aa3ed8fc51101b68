//! cdmkit - a uniform hierarchical data model over scientific file formats.
//!
//! Every supported file is presented as a tree of scopes holding shared
//! dimensions, typed variables and attributes, plus streams of records that
//! are decoded lazily, one field at a time.
//!
//! # Features
//!
//! - Immutable namespace trees assembled through validating builders
//! - Zero-copy decoding of fixed-size binary records
//! - Column-layout text records with derived fields
//! - Sequential, keyed and block-framed record streams
//! - Persisted secondary indices for per-key random access
//! - Format detection through a static decoder registry
//!
//! # Example
//!
//! ```ignore
//! use cdmkit::{Dataset, RecordStream};
//!
//! let dataset = Dataset::open("v3.mean.dat")?;
//! println!("{}", cdmkit::render::render_tree(dataset.tree(), None));
//!
//! // Every year recorded for one station, read straight from its index entry.
//! let mut years = dataset.keyed_stream("station/stn_data", "10160355000")?;
//! while years.has_next()? {
//!     println!("{}", years.next_record()?.value("year")?);
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod formats;
pub mod index;
pub mod model;
pub mod record;
pub mod render;

pub use config::{IndexConfig, IndexPolicy, OpenOptions};
pub use dataset::{Dataset, RecordAccess};
pub use error::{CdmError, Result};
pub use formats::{DecoderRegistry, FormatDecoder};
pub use index::{IndexEntry, SecondaryIndex};
pub use model::{NamespaceTree, Scope, ScopeBuilder, Variable, VariableBuilder};
pub use record::{Record, RecordStream};
