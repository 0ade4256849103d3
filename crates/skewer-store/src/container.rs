//! The container contract shared by all backends.

use std::path::Path;

use crate::error::StoreError;
use crate::layout::{AttrValue, DatasetLayout};

/// Opens containers by filesystem path.
pub trait StructuredStore: Send + Sync {
    /// Create a container, truncating any existing one at `path`.
    fn create(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError>;

    /// Open an existing container for reading and writing.
    fn open_rw(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError>;

    /// Open an existing container for reading only.
    fn open_ro(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError>;

    /// Whether a container exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// One open container.
///
/// Dropping the handle closes it. [`close`](Self::close) does the same but
/// reports errors.
pub trait ContainerFile {
    /// Create a group. Its parent must exist.
    fn create_group(&mut self, path: &str) -> Result<(), StoreError>;

    /// Whether a group exists at `path`.
    fn has_group(&self, path: &str) -> bool;

    /// Whether a dataset exists at `path`.
    fn has_dataset(&self, path: &str) -> bool;

    /// Create or replace attribute `name` on the group or dataset at `object`.
    fn write_attribute(
        &mut self,
        object: &str,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), StoreError>;

    /// Read attribute `name` of the group or dataset at `object`.
    fn read_attribute(&self, object: &str, name: &str) -> Result<AttrValue, StoreError>;

    /// Whether attribute `name` exists on `object`.
    fn has_attribute(&self, object: &str, name: &str) -> bool;

    /// Attribute names of `object`.
    fn attribute_names(&self, object: &str) -> Result<Vec<String>, StoreError>;

    /// Allocate a dataset. Its parent group must exist.
    fn create_dataset(&mut self, path: &str, layout: &DatasetLayout) -> Result<(), StoreError>;

    /// Layout of an existing dataset.
    fn dataset_layout(&self, path: &str) -> Result<DatasetLayout, StoreError>;

    /// Write whole rows starting at `row_offset`.
    ///
    /// `bytes` holds little-endian values and must be a whole number of rows.
    fn write_rows(&mut self, path: &str, row_offset: u64, bytes: &[u8]) -> Result<(), StoreError>;

    /// Read `rows` whole rows starting at `row_offset` as little-endian bytes.
    fn read_rows(&self, path: &str, row_offset: u64, rows: u64) -> Result<Vec<u8>, StoreError>;

    /// Flush and close the container.
    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Normalise an object path to an absolute form without a trailing slash.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push('/');
    out.push_str(trimmed);
    out
}

/// Parent of a normalised path (`"/"` for top-level objects).
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Check that `[offset, offset + rows)` lies within `len` rows.
pub fn check_bounds(path: &str, offset: u64, rows: u64, len: u64) -> Result<(), StoreError> {
    match offset.checked_add(rows) {
        Some(end) if end <= len => Ok(()),
        _ => Err(StoreError::OutOfBounds {
            path: path.to_string(),
            offset,
            rows,
            len,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_normalise() {
        assert_eq!(normalize_path("LOS_0001/"), "/LOS_0001");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(parent_path("/LOS_0001/Masses"), "/LOS_0001");
        assert_eq!(parent_path("/Header"), "/");
    }

    #[test]
    fn bounds_reject_overflow() {
        assert!(check_bounds("/d", 2, 3, 5).is_ok());
        assert!(check_bounds("/d", 3, 3, 5).is_err());
        assert!(check_bounds("/d", u64::MAX, 2, 5).is_err());
    }
}
