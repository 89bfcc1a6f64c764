use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{MetadataError, Result};
use crate::tree::archive::MetadataTree;

/// Shareable handle to one archive's tree.
///
/// All access to a tree goes through its single lock, so sibling uniqueness
/// and cascade removal are never observed half done. Separate archives have
/// separate handles and do not contend.
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    inner: Arc<Mutex<MetadataTree>>,
}

impl ArchiveHandle {
    pub fn new(tree: MetadataTree) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tree)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MetadataTree>> {
        self.inner
            .lock()
            .map_err(|_| MetadataError::InvalidState("Archive lock poisoned".to_string()))
    }

    /// Run `f` with shared access to the tree.
    pub fn with<T>(&self, f: impl FnOnce(&MetadataTree) -> T) -> Result<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access to the tree.
    pub fn with_mut<T>(&self, f: impl FnOnce(&mut MetadataTree) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        f(&mut guard)
    }

    /// Take the tree back once no other handle remains.
    pub fn into_inner(self) -> Result<MetadataTree> {
        Arc::try_unwrap(self.inner)
            .map_err(|_| MetadataError::InvalidState("Archive is still shared".to_string()))?
            .into_inner()
            .map_err(|_| MetadataError::InvalidState("Archive lock poisoned".to_string()))
    }
}
