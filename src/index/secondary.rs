//! Key to record-range index built by one linear scan.

use super::entry::IndexEntry;
use super::varint::{decode_varint, encode_varint};
use crate::config::{IndexConfig, IndexPolicy};
use crate::error::{CdmError, Result};
use crate::record::{Record, RecordSource};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Leading bytes of every index file.
pub const INDEX_MAGIC: &[u8] = b"CDMRIDX";
/// Current index file version.
pub const INDEX_VERSION: u8 = 1;

/// Accumulates entries while the primary file is scanned in order.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    entries: Vec<IndexEntry>,
    by_key: HashMap<String, usize>,
    open: Option<usize>,
    violations: u64,
}

impl IndexBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the record at `offset` has `key`.
    ///
    /// Records of one key are expected to be adjacent. A key that comes back
    /// after another key was seen is an ordering violation: it is logged,
    /// counted, and its entry is marked non-contiguous.
    pub fn observe(&mut self, key: &str, offset: u64) {
        if let Some(i) = self.open {
            if self.entries[i].key == key {
                self.entries[i].count += 1;
                return;
            }
        }
        match self.by_key.get(key) {
            Some(&i) => {
                warn!("Key {} not in order at offset {}", key, offset);
                self.violations += 1;
                let entry = &mut self.entries[i];
                entry.count += 1;
                entry.contiguous = false;
                self.open = Some(i);
            },
            None => {
                let i = self.entries.len();
                self.entries.push(IndexEntry::new(key, offset));
                self.by_key.insert(key.to_string(), i);
                self.open = Some(i);
            },
        }
    }

    /// Attach a companion catalog offset to `key`. Returns false if the key
    /// has no records.
    pub fn annotate_catalog(&mut self, key: &str, catalog_offset: u64) -> bool {
        match self.by_key.get(key) {
            Some(&i) => {
                self.entries[i].catalog_offset = Some(catalog_offset);
                true
            },
            None => false,
        }
    }

    /// Scan `source` from its start, keying each record with `key_of`.
    pub fn scan<S, F>(&mut self, source: &mut S, key_of: F) -> Result<u64>
    where
        S: RecordSource + ?Sized,
        F: Fn(&Record) -> Result<String>,
    {
        source.seek(0)?;
        let mut records = 0;
        while let Some((offset, record)) = source.read_record()? {
            self.observe(&key_of(&record)?, offset);
            records += 1;
        }
        debug!("Indexed {} records into {} keys", records, self.entries.len());
        Ok(records)
    }

    /// Freeze into an immutable index.
    pub fn finish(self) -> SecondaryIndex {
        SecondaryIndex {
            entries: self.entries,
            by_key: self.by_key,
            violations: self.violations,
        }
    }
}

/// Immutable map from key to the byte range of its records.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryIndex {
    entries: Vec<IndexEntry>,
    by_key: HashMap<String, usize>,
    violations: u64,
}

impl SecondaryIndex {
    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.by_key.get(key).map(|i| &self.entries[*i])
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no key was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordering violations seen while building. For a loaded index this is
    /// the number of non-contiguous entries.
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Serialize to the on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INDEX_MAGIC.len() + 1 + self.entries.len() * 24);
        buf.extend_from_slice(INDEX_MAGIC);
        buf.push(INDEX_VERSION);
        encode_varint(self.entries.len() as u64, &mut buf);
        for entry in &self.entries {
            let encoded = entry.encode();
            encode_varint(encoded.len() as u64, &mut buf);
            buf.extend_from_slice(&encoded);
        }
        buf
    }

    /// Parse the on-disk layout, validating magic, version and every entry.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if !buf.starts_with(INDEX_MAGIC) {
            return Err(CdmError::IndexFormat("bad magic".into()));
        }
        let mut pos = INDEX_MAGIC.len();
        match buf.get(pos) {
            Some(&INDEX_VERSION) => pos += 1,
            Some(v) => return Err(CdmError::IndexFormat(format!("unsupported version {}", v))),
            None => return Err(CdmError::IndexFormat("missing version".into())),
        }
        let count = decode_varint(buf, &mut pos)?;
        let mut entries = Vec::new();
        let mut by_key = HashMap::new();
        for _ in 0..count {
            let len = decode_varint(buf, &mut pos)? as usize;
            let end = pos
                .checked_add(len)
                .filter(|end| *end <= buf.len())
                .ok_or_else(|| CdmError::IndexFormat("entry past end of file".into()))?;
            let entry = IndexEntry::decode(&buf[pos..end])?;
            pos = end;
            if by_key.insert(entry.key.clone(), entries.len()).is_some() {
                return Err(CdmError::IndexFormat(format!("duplicate key {}", entry.key)));
            }
            entries.push(entry);
        }
        if pos != buf.len() {
            return Err(CdmError::IndexFormat(format!(
                "{} trailing bytes",
                buf.len() - pos
            )));
        }
        let violations = entries.iter().filter(|e| !e.contiguous).count() as u64;
        Ok(Self {
            entries,
            by_key,
            violations,
        })
    }

    /// Write to `path`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()).map_err(|e| CdmError::file_open(path, e))?;
        info!("Wrote index {} ({} keys)", path.display(), self.len());
        Ok(())
    }

    /// Read and validate an index file.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CdmError::file_open(path, e))?;
        Self::from_bytes(&bytes)
    }

    /// Load an index if it exists, decodes, and is not older than any of the
    /// `sources` it was built from. Every failure is logged and yields `None`.
    pub fn load_fresh(index_path: &Path, sources: &[&Path]) -> Option<Self> {
        let index_time = fs::metadata(index_path).ok()?.modified().ok();
        let newer = sources.iter().find(|source| {
            match (index_time, fs::metadata(source).and_then(|m| m.modified())) {
                (Some(index_time), Ok(source_time)) => index_time < source_time,
                _ => false,
            }
        });
        if let Some(source) = newer {
            warn!("Index {} is older than {}, rebuilding", index_path.display(), source.display());
            return None;
        }
        match Self::read(index_path) {
            Ok(index) => {
                debug!("Loaded index {} ({} keys)", index_path.display(), index.len());
                Some(index)
            },
            Err(e) => {
                warn!("Unusable index {}: {}, rebuilding", index_path.display(), e);
                None
            },
        }
    }

    /// Load or build the index for `primary` according to `config`.
    ///
    /// `companions` are the other files whose offsets the index stores; an
    /// index older than any of them is rebuilt. Returns `None` when indexing
    /// is disabled. A rebuilt index is written
    /// back when `config.persist` is set; write failures are logged and the
    /// in-memory index is still returned. Only one writer per index file is
    /// supported.
    pub fn open_or_build<F>(
        primary: &Path,
        companions: &[&Path],
        config: &IndexConfig,
        build: F,
    ) -> Result<Option<Self>>
    where
        F: FnOnce() -> Result<Self>,
    {
        let path = config.index_path(primary);
        match config.policy {
            IndexPolicy::Disabled => return Ok(None),
            IndexPolicy::Auto => {
                let mut sources = vec![primary];
                sources.extend_from_slice(companions);
                if let Some(index) = Self::load_fresh(&path, &sources) {
                    return Ok(Some(index));
                }
            },
            IndexPolicy::Rebuild => {},
        }
        debug!("Building index for {}", primary.display());
        let index = build()?;
        if config.persist {
            if let Err(e) = index.write(&path) {
                warn!("Could not write index {}: {}", path.display(), e);
            }
        }
        Ok(Some(index))
    }
}
