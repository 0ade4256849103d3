//! A container path plus the handle a rank currently holds on it.

use std::fmt;
use std::path::{Path, PathBuf};

use skewer_store::{ContainerFile, StructuredStore};

use crate::error::OutputError;

/// One output file as seen by one rank.
///
/// The root creates the file and keeps a handle between collective steps.
/// A rank taking its round-robin turn opens the file read-write through
/// [`file`](Self::file) and gives the handle back with
/// [`release`](Self::release), so at most one rank mutates the container at
/// a time.
pub struct OutputTarget<'s> {
    store: &'s dyn StructuredStore,
    path: PathBuf,
    handle: Option<Box<dyn ContainerFile>>,
}

impl<'s> OutputTarget<'s> {
    /// Create (truncating) the file at `path` and hold it open.
    pub fn create(store: &'s dyn StructuredStore, path: impl Into<PathBuf>) -> Result<Self, OutputError> {
        let path = path.into();
        let handle = store.create(&path)?;
        tracing::info!(path = %path.display(), "created output file");
        Ok(Self {
            store,
            path,
            handle: Some(handle),
        })
    }

    /// Refer to a file some other rank creates, without opening it.
    pub fn detached(store: &'s dyn StructuredStore, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
            handle: None,
        }
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this rank currently holds a handle.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// The open handle, opening the file read-write if needed.
    pub fn file(&mut self) -> Result<&mut dyn ContainerFile, OutputError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.store.open_rw(&self.path)?,
        };
        Ok(self.handle.insert(handle).as_mut())
    }

    /// Close the handle if one is held.
    pub fn release(&mut self) -> Result<(), OutputError> {
        if let Some(handle) = self.handle.take() {
            handle.close()?;
        }
        Ok(())
    }

    /// Close the file and return its path.
    pub fn finish(mut self) -> Result<PathBuf, OutputError> {
        self.release()?;
        Ok(std::mem::take(&mut self.path))
    }
}

impl fmt::Debug for OutputTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputTarget")
            .field("path", &self.path)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skewer_store::MemoryStore;

    #[test]
    fn detached_target_opens_on_demand() {
        let store = MemoryStore::new();
        let mut root = OutputTarget::create(&store, "t.hdf5").unwrap();
        root.file().unwrap().create_group("/A").unwrap();
        root.release().unwrap();
        assert!(!root.is_open());

        let mut other = OutputTarget::detached(&store, "t.hdf5");
        assert!(other.file().unwrap().has_group("/A"));
        other.file().unwrap().create_group("/B").unwrap();
        assert_eq!(other.finish().unwrap(), PathBuf::from("t.hdf5"));

        assert!(root.file().unwrap().has_group("/B"));
    }

    #[test]
    fn detached_target_on_missing_file_fails() {
        let store = MemoryStore::new();
        let mut t = OutputTarget::detached(&store, "missing.hdf5");
        assert!(matches!(t.file(), Err(OutputError::Store(_))));
    }
}
