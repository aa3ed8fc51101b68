//! Shared handle to a backing file.

use crate::error::{CdmError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Default)]
struct ResourceState {
    closed: AtomicBool,
}

/// A file that streams read from.
///
/// Clones share open/closed state. Every stream opens its own file handle, so
/// cursors never interfere; closing the resource makes every later stream
/// call fail with [`CdmError::ResourceClosed`].
#[derive(Debug, Clone)]
pub struct Resource {
    path: PathBuf,
    state: Arc<ResourceState>,
}

impl Resource {
    /// Open a resource, checking that the file is readable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        File::open(&path).map_err(|e| CdmError::file_open(&path, e))?;
        Ok(Self {
            path,
            state: Arc::default(),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the backing file in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Check if the backing file is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Last modification time of the backing file.
    pub fn modified(&self) -> Result<SystemTime> {
        Ok(std::fs::metadata(&self.path)?.modified()?)
    }

    /// Fail with [`CdmError::ResourceClosed`] once closed.
    pub fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CdmError::ResourceClosed {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Open a fresh handle for one cursor.
    pub fn open_handle(&self) -> Result<File> {
        self.check_open()?;
        File::open(&self.path).map_err(|e| CdmError::file_open(&self.path, e))
    }

    /// Close the resource. Idempotent.
    pub fn close(&self) {
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed resource {}", self.path.display());
        }
    }

    /// Check if the resource has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_close_shared_by_clones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let resource = Resource::open(file.path()).unwrap();
        let clone = resource.clone();
        assert_eq!(clone.len().unwrap(), 3);
        assert!(clone.open_handle().is_ok());
        resource.close();
        resource.close();
        assert!(clone.is_closed());
        assert!(matches!(
            clone.open_handle(),
            Err(CdmError::ResourceClosed { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Resource::open("/definitely/not/here.dat").unwrap_err();
        assert!(matches!(err, CdmError::FileOpen { .. }));
    }
}
