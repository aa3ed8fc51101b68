//! Options controlling how datasets are opened.

use std::path::{Path, PathBuf};

/// What to do with a secondary index when opening a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexPolicy {
    /// Load a valid, up to date index; rebuild it otherwise.
    #[default]
    Auto,
    /// Always rebuild, ignoring any index on disk.
    Rebuild,
    /// Never build or load one; keyed access scans the whole file.
    Disabled,
}

/// Configuration for secondary index files.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Load/rebuild behaviour.
    pub policy: IndexPolicy,
    /// Suffix appended to the primary file name to form the index path.
    pub suffix: String,
    /// Write rebuilt indices back to disk.
    pub persist: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            policy: IndexPolicy::Auto,
            suffix: ".cdmx".to_string(),
            persist: true,
        }
    }
}

impl IndexConfig {
    /// Index path next to `primary`: `data.dat` becomes `data.dat.cdmx`.
    pub fn index_path(&self, primary: &Path) -> PathBuf {
        let mut name = primary.as_os_str().to_os_string();
        name.push(&self.suffix);
        PathBuf::from(name)
    }
}

/// Combined configuration for opening a dataset.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Secondary index handling.
    pub index: IndexConfig,
}

impl OpenOptions {
    /// Options with the given index policy and all other defaults.
    pub fn with_index_policy(policy: IndexPolicy) -> Self {
        let mut options = Self::default();
        options.index.policy = policy;
        options
    }
}
