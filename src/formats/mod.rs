//! Format decoders and the static registry that selects among them.

pub mod lightning;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod station;

use crate::config::OpenOptions;
use crate::dataset::Dataset;
use crate::error::{CdmError, Result};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// A decoder turning one file format into a [`Dataset`].
pub trait FormatDecoder: Send + Sync {
    /// Short unique identifier.
    fn id(&self) -> &'static str;

    /// Human readable description.
    fn description(&self) -> &'static str;

    /// Cheap check whether `path` looks like this format. Must not fail.
    fn is_valid_file(&self, path: &Path) -> bool;

    /// Open `path`, which passed `is_valid_file`.
    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Dataset>;
}

/// Ordered set of decoders; the first that accepts a file wins.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn FormatDecoder>>,
}

impl DecoderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in decoder.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(lightning::LightningDecoder));
        registry.register(Box::new(station::StationDecoder));
        #[cfg(feature = "netcdf")]
        registry.register(Box::new(self::netcdf::NetcdfDecoder));
        registry
    }

    /// Process-wide registry of built-in decoders, created on first use.
    pub fn global() -> &'static DecoderRegistry {
        static REGISTRY: OnceLock<DecoderRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::builtin)
    }

    /// Append a decoder.
    pub fn register(&mut self, decoder: Box<dyn FormatDecoder>) {
        self.decoders.push(decoder);
    }

    /// Registered decoders in priority order.
    pub fn decoders(&self) -> impl Iterator<Item = &dyn FormatDecoder> {
        self.decoders.iter().map(|d| d.as_ref())
    }

    /// Find a decoder by id, ignoring case.
    pub fn find(&self, id: &str) -> Option<&dyn FormatDecoder> {
        self.decoders().find(|d| d.id().eq_ignore_ascii_case(id))
    }

    /// First decoder accepting `path`.
    pub fn detect(&self, path: &Path) -> Result<&dyn FormatDecoder> {
        if !path.exists() {
            return Err(CdmError::file_open(
                path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        self.decoders()
            .find(|d| d.is_valid_file(path))
            .ok_or_else(|| CdmError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }

    /// Detect the format of `path` and open it.
    pub fn open(&self, path: &Path, options: &OpenOptions) -> Result<Dataset> {
        let decoder = self.detect(path)?;
        debug!("Opening {} as {}", path.display(), decoder.id());
        decoder.open(path, options)
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decoders().map(|d| d.id()))
            .finish()
    }
}
