//! An opened dataset: its namespace tree plus record access.

use crate::config::OpenOptions;
use crate::error::{CdmError, Result};
use crate::formats::DecoderRegistry;
use crate::index::SecondaryIndex;
use crate::model::NamespaceTree;
use crate::record::{BoxedStream, Resource};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Record access supplied by a format decoder.
pub trait RecordAccess: fmt::Debug {
    /// Paths of variables that can be streamed (`"record"`, `"station/stn_data"`).
    fn sequences(&self) -> Vec<String>;

    /// Stream every record of a sequence.
    fn stream(&self, sequence: &str) -> Result<BoxedStream>;

    /// Stream the records of a sequence that belong to `key`.
    fn keyed_stream(&self, sequence: &str, _key: &str) -> Result<BoxedStream> {
        Err(CdmError::not_found(format!("keyed access to {}", sequence)))
    }

    /// Secondary index backing keyed access, if any.
    fn index(&self) -> Option<&SecondaryIndex> {
        None
    }
}

/// An open dataset. Owns up to two resources (primary records and a
/// companion catalog) that are closed together.
#[derive(Debug)]
pub struct Dataset {
    path: PathBuf,
    format: &'static str,
    tree: NamespaceTree,
    access: Box<dyn RecordAccess>,
    resources: Vec<Resource>,
    closed: bool,
}

impl Dataset {
    /// Open a file with the first registered decoder that accepts it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open a file with explicit options.
    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        DecoderRegistry::global().open(path.as_ref(), options)
    }

    /// Assemble a dataset. Used by format decoders.
    pub fn new(
        path: impl Into<PathBuf>,
        format: &'static str,
        tree: NamespaceTree,
        access: Box<dyn RecordAccess>,
        resources: Vec<Resource>,
    ) -> Self {
        Self {
            path: path.into(),
            format,
            tree,
            access,
            resources,
            closed: false,
        }
    }

    /// Path the dataset was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifier of the decoder that opened it.
    pub fn format(&self) -> &'static str {
        self.format
    }

    /// The immutable namespace tree.
    pub fn tree(&self) -> &NamespaceTree {
        &self.tree
    }

    /// Streamable sequence paths.
    pub fn sequences(&self) -> Vec<String> {
        self.access.sequences()
    }

    /// Stream every record of a sequence.
    pub fn stream(&self, sequence: &str) -> Result<BoxedStream> {
        self.check_open()?;
        self.access.stream(sequence)
    }

    /// Stream the records of `sequence` belonging to `key`.
    pub fn keyed_stream(&self, sequence: &str, key: &str) -> Result<BoxedStream> {
        self.check_open()?;
        self.access.keyed_stream(sequence, key)
    }

    /// Secondary index, if the format uses one.
    pub fn index(&self) -> Option<&SecondaryIndex> {
        self.access.index()
    }

    /// Resources backing this dataset.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Close every resource. Streams created earlier fail from now on.
    /// Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for resource in &self.resources {
            resource.close();
        }
        self.closed = true;
        debug!("Closed dataset {}", self.path.display());
    }

    /// Check if the dataset has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(CdmError::ResourceClosed {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        self.close();
    }
}
