//! Record-type-erased column access.
//!
//! The I/O layer writes and reads whole columns (one field across many
//! records) without knowing the record type. [`CatalogView`] and
//! [`CatalogViewMut`] adapt a catalog plus a record slice to these traits.

use crate::error::ConfigError;
use crate::field::{FieldCatalog, FieldMeta};

/// A readable set of columns over a fixed number of rows.
pub trait ColumnSource {
    /// Number of rows.
    fn rows(&self) -> usize;

    /// Number of columns.
    fn column_count(&self) -> usize;

    /// Metadata of column `index`.
    fn column(&self, index: usize) -> &FieldMeta;

    /// Pack column `index` of every row into little-endian bytes.
    fn gather(&self, index: usize) -> Vec<u8>;
}

/// A writable set of columns over a fixed number of rows.
pub trait ColumnSink {
    /// Number of rows.
    fn rows(&self) -> usize;

    /// Number of columns.
    fn column_count(&self) -> usize;

    /// Metadata of column `index`.
    fn column(&self, index: usize) -> &FieldMeta;

    /// Unpack little-endian bytes into column `index` of every row.
    fn scatter(&mut self, index: usize, bytes: &[u8]) -> Result<(), ConfigError>;

    /// Zero column `index` of every row.
    fn zero_fill(&mut self, index: usize) -> Result<(), ConfigError>;
}

/// Borrowed catalog and records, read side.
pub struct CatalogView<'a, R> {
    catalog: &'a FieldCatalog<R>,
    records: &'a [R],
}

impl<'a, R> CatalogView<'a, R> {
    /// Pair a catalog with the records it describes.
    pub fn new(catalog: &'a FieldCatalog<R>, records: &'a [R]) -> Self {
        Self { catalog, records }
    }
}

impl<R> ColumnSource for CatalogView<'_, R> {
    fn rows(&self) -> usize {
        self.records.len()
    }

    fn column_count(&self) -> usize {
        self.catalog.len()
    }

    fn column(&self, index: usize) -> &FieldMeta {
        catalog_meta(self.catalog, index)
    }

    fn gather(&self, index: usize) -> Vec<u8> {
        match self.catalog.field(index) {
            Some(d) => d.gather(self.records),
            None => Vec::new(),
        }
    }
}

/// Borrowed catalog and records, write side.
pub struct CatalogViewMut<'a, R> {
    catalog: &'a FieldCatalog<R>,
    records: &'a mut [R],
}

impl<'a, R> CatalogViewMut<'a, R> {
    /// Pair a catalog with the records it fills.
    pub fn new(catalog: &'a FieldCatalog<R>, records: &'a mut [R]) -> Self {
        Self { catalog, records }
    }
}

impl<R> ColumnSink for CatalogViewMut<'_, R> {
    fn rows(&self) -> usize {
        self.records.len()
    }

    fn column_count(&self) -> usize {
        self.catalog.len()
    }

    fn column(&self, index: usize) -> &FieldMeta {
        catalog_meta(self.catalog, index)
    }

    fn scatter(&mut self, index: usize, bytes: &[u8]) -> Result<(), ConfigError> {
        let field = self.catalog.field(index).ok_or_else(|| out_of_range(index))?;
        field.scatter(self.records, bytes)
    }

    fn zero_fill(&mut self, index: usize) -> Result<(), ConfigError> {
        let field = self.catalog.field(index).ok_or_else(|| out_of_range(index))?;
        field.zero_fill(self.records)
    }
}

fn catalog_meta<R>(catalog: &FieldCatalog<R>, index: usize) -> &FieldMeta {
    match catalog.field(index) {
        Some(d) => d.meta(),
        None => panic!("column index {index} out of range for {} columns", catalog.len()),
    }
}

fn out_of_range(index: usize) -> ConfigError {
    ConfigError::InvalidConfig {
        reason: format!("column index {index} out of range"),
    }
}
