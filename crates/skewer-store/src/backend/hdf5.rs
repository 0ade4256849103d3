//! HDF5 container backend.
//!
//! Thin mapping of the container contract onto `hdf5-metno`: groups and
//! datasets are addressed by absolute path, numeric attributes are 1-D,
//! strings are variable-length UTF-8 scalars. Filters are applied by the
//! library.

use std::path::Path;
use std::str::FromStr;

use hdf5::filters::Filter;
use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenUnicode};
use hdf5::{File, H5Type, Location};
use ndarray::{s, Array2, ArrayView1};
use smallvec::SmallVec;

use skewer_core::{Element, ElementType};

use crate::container::{check_bounds, normalize_path, ContainerFile, StructuredStore};
use crate::error::StoreError;
use crate::layout::{AttrValue, DatasetLayout};

macro_rules! with_element {
    ($element:expr, $T:ident => $body:expr) => {
        match $element {
            ElementType::U8 => {
                type $T = u8;
                $body
            }
            ElementType::I32 => {
                type $T = i32;
                $body
            }
            ElementType::U32 => {
                type $T = u32;
                $body
            }
            ElementType::I64 => {
                type $T = i64;
                $body
            }
            ElementType::U64 => {
                type $T = u64;
                $body
            }
            ElementType::F32 => {
                type $T = f32;
                $body
            }
            ElementType::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

/// Real HDF5 files on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hdf5Store;

impl Hdf5Store {
    /// The HDF5 backend.
    pub fn new() -> Self {
        Self
    }
}

impl StructuredStore for Hdf5Store {
    fn create(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError> {
        let file = File::create(path)?;
        tracing::debug!(path = %path.display(), "created HDF5 file");
        Ok(Box::new(Hdf5File { file }))
    }

    fn open_rw(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError> {
        Ok(Box::new(Hdf5File {
            file: File::open_rw(path)?,
        }))
    }

    fn open_ro(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError> {
        Ok(Box::new(Hdf5File {
            file: File::open(path)?,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

struct Hdf5File {
    file: File,
}

impl Hdf5File {
    fn location(&self, object: &str) -> Result<Location, StoreError> {
        let path = normalize_path(object);
        if let Ok(group) = self.file.group(&path) {
            return Ok((*group).clone());
        }
        match self.file.dataset(&path) {
            Ok(ds) => Ok((*ds).clone()),
            Err(_) => Err(StoreError::NotFound { path }),
        }
    }
}

fn to_values<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::TYPE.size()).map(T::take).collect()
}

fn to_bytes<T: Element>(values: impl IntoIterator<Item = T>) -> Vec<u8> {
    let size = T::TYPE.size();
    let mut out = Vec::new();
    for v in values {
        let start = out.len();
        out.resize(start + size, 0);
        v.put(&mut out[start..]);
    }
    out
}

fn write_numeric<T: H5Type>(loc: &Location, name: &str, values: &[T]) -> Result<(), StoreError> {
    let attr = loc.new_attr::<T>().shape(values.len()).create(name)?;
    attr.write_raw(values)?;
    Ok(())
}

fn element_of(desc: &TypeDescriptor) -> Option<ElementType> {
    Some(match desc {
        TypeDescriptor::Unsigned(IntSize::U1) => ElementType::U8,
        TypeDescriptor::Integer(IntSize::U4) => ElementType::I32,
        TypeDescriptor::Unsigned(IntSize::U4) => ElementType::U32,
        TypeDescriptor::Integer(IntSize::U8) => ElementType::I64,
        TypeDescriptor::Unsigned(IntSize::U8) => ElementType::U64,
        TypeDescriptor::Float(FloatSize::U4) => ElementType::F32,
        TypeDescriptor::Float(FloatSize::U8) => ElementType::F64,
        _ => return None,
    })
}

impl ContainerFile for Hdf5File {
    fn create_group(&mut self, path: &str) -> Result<(), StoreError> {
        let path = normalize_path(path);
        if self.file.link_exists(&path) {
            return Err(StoreError::AlreadyExists { path });
        }
        self.file.create_group(&path)?;
        Ok(())
    }

    fn has_group(&self, path: &str) -> bool {
        self.file.group(&normalize_path(path)).is_ok()
    }

    fn has_dataset(&self, path: &str) -> bool {
        self.file.dataset(&normalize_path(path)).is_ok()
    }

    fn write_attribute(
        &mut self,
        object: &str,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), StoreError> {
        let loc = self.location(object)?;
        if loc.attr_names()?.iter().any(|n| n == name) {
            loc.delete_attr(name)?;
        }
        match value {
            AttrValue::I32(v) => write_numeric(&loc, name, v),
            AttrValue::U32(v) => write_numeric(&loc, name, v),
            AttrValue::I64(v) => write_numeric(&loc, name, v),
            AttrValue::U64(v) => write_numeric(&loc, name, v),
            AttrValue::F32(v) => write_numeric(&loc, name, v),
            AttrValue::F64(v) => write_numeric(&loc, name, v),
            AttrValue::Str(s) => {
                let text = VarLenUnicode::from_str(s).map_err(|e| StoreError::Backend {
                    detail: format!("attribute {name} is not valid text: {e}"),
                })?;
                loc.new_attr::<VarLenUnicode>()
                    .create(name)?
                    .write_scalar(&text)?;
                Ok(())
            }
        }
    }

    fn read_attribute(&self, object: &str, name: &str) -> Result<AttrValue, StoreError> {
        let loc = self.location(object)?;
        let attr = loc.attr(name).map_err(|_| StoreError::NotFound {
            path: format!("{}@{name}", normalize_path(object)),
        })?;
        let desc = attr.dtype()?.to_descriptor()?;
        Ok(match desc {
            TypeDescriptor::Integer(IntSize::U4) => AttrValue::I32(attr.read_raw()?),
            TypeDescriptor::Unsigned(IntSize::U4) => AttrValue::U32(attr.read_raw()?),
            TypeDescriptor::Integer(IntSize::U8) => AttrValue::I64(attr.read_raw()?),
            TypeDescriptor::Unsigned(IntSize::U8) => AttrValue::U64(attr.read_raw()?),
            TypeDescriptor::Float(FloatSize::U4) => AttrValue::F32(attr.read_raw()?),
            TypeDescriptor::Float(FloatSize::U8) => AttrValue::F64(attr.read_raw()?),
            TypeDescriptor::VarLenUnicode => {
                AttrValue::Str(attr.read_scalar::<VarLenUnicode>()?.to_string())
            }
            other => {
                return Err(StoreError::Backend {
                    detail: format!("unsupported attribute type {other:?} for {name}"),
                })
            }
        })
    }

    fn has_attribute(&self, object: &str, name: &str) -> bool {
        self.location(object)
            .and_then(|loc| Ok(loc.attr_names()?))
            .is_ok_and(|names| names.iter().any(|n| n == name))
    }

    fn attribute_names(&self, object: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.location(object)?.attr_names()?)
    }

    fn create_dataset(&mut self, path: &str, layout: &DatasetLayout) -> Result<(), StoreError> {
        layout.validate()?;
        let path = normalize_path(path);
        if self.file.link_exists(&path) {
            return Err(StoreError::AlreadyExists { path });
        }
        let shape: Vec<usize> = layout.shape.iter().map(|&d| d as usize).collect();
        let chunk: Vec<usize> = layout.chunk.iter().map(|&d| d as usize).collect();
        with_element!(layout.element, T => {
            let mut builder = self.file.new_dataset::<T>().shape(shape).chunk(chunk);
            if layout.fletcher32 {
                builder = builder.fletcher32();
            }
            if layout.shuffle {
                builder = builder.shuffle();
            }
            if let Some(level) = layout.deflate {
                builder = builder.deflate(level);
            }
            builder.create(path.as_str())?;
        });
        Ok(())
    }

    fn dataset_layout(&self, path: &str) -> Result<DatasetLayout, StoreError> {
        let path = normalize_path(path);
        let ds = self
            .file
            .dataset(&path)
            .map_err(|_| StoreError::NotFound { path: path.clone() })?;
        let element = element_of(&ds.dtype()?.to_descriptor()?).ok_or_else(|| {
            StoreError::Backend {
                detail: format!("unsupported element type in {path}"),
            }
        })?;
        let shape: SmallVec<[u64; 2]> = ds.shape().iter().map(|&d| d as u64).collect();
        let chunk: SmallVec<[u64; 2]> = match ds.chunk() {
            Some(c) => c.iter().map(|&d| d as u64).collect(),
            None => shape.clone(),
        };
        let mut layout = DatasetLayout {
            element,
            shape,
            chunk,
            fletcher32: false,
            shuffle: false,
            deflate: None,
        };
        for filter in ds.filters() {
            match filter {
                Filter::Fletcher32 => layout.fletcher32 = true,
                Filter::Shuffle => layout.shuffle = true,
                Filter::Deflate(level) => layout.deflate = Some(level),
                _ => {}
            }
        }
        Ok(layout)
    }

    fn write_rows(&mut self, path: &str, row_offset: u64, bytes: &[u8]) -> Result<(), StoreError> {
        let layout = self.dataset_layout(path)?;
        let path = normalize_path(path);
        let row_bytes = layout.row_bytes();
        if row_bytes == 0 || bytes.len() % row_bytes != 0 {
            return Err(StoreError::RaggedBuffer {
                path,
                bytes: bytes.len(),
                row_bytes,
            });
        }
        let rows = (bytes.len() / row_bytes) as u64;
        check_bounds(&path, row_offset, rows, layout.row_count())?;
        if rows == 0 {
            return Ok(());
        }
        let ds = self.file.dataset(&path)?;
        let (start, end) = (row_offset as usize, (row_offset + rows) as usize);
        with_element!(layout.element, T => {
            let values = to_values::<T>(bytes);
            if layout.shape.len() == 1 {
                ds.write_slice(ArrayView1::from(&values[..]), s![start..end])?;
            } else {
                let block = Array2::from_shape_vec((rows as usize, layout.dim()), values)
                    .map_err(|e| StoreError::Backend { detail: e.to_string() })?;
                ds.write_slice(&block, s![start..end, ..])?;
            }
        });
        Ok(())
    }

    fn read_rows(&self, path: &str, row_offset: u64, rows: u64) -> Result<Vec<u8>, StoreError> {
        let layout = self.dataset_layout(path)?;
        let path = normalize_path(path);
        check_bounds(&path, row_offset, rows, layout.row_count())?;
        if rows == 0 {
            return Ok(Vec::new());
        }
        let ds = self.file.dataset(&path)?;
        let (start, end) = (row_offset as usize, (row_offset + rows) as usize);
        Ok(with_element!(layout.element, T => {
            if layout.shape.len() == 1 {
                let block = ds.read_slice_1d::<T, _>(s![start..end])?;
                to_bytes(block.iter().copied())
            } else {
                let block = ds.read_slice_2d::<T, _>(s![start..end, ..])?;
                to_bytes(block.iter().copied())
            }
        }))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.file.close()?;
        Ok(())
    }
}
