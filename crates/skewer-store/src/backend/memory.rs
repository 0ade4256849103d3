//! In-process container backend.
//!
//! Every container lives in a shared map keyed by path, so handles opened
//! by different ranks of one process see the same bytes. Dataset chunks
//! are stored filtered: shuffled when the layout asks for it, with a
//! Fletcher-32 trailer when checksums are on. Checksums are verified on
//! every read. Deflate levels are recorded in the layout but chunks are
//! kept uncompressed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::container::{check_bounds, normalize_path, parent_path, ContainerFile, StructuredStore};
use crate::error::StoreError;
use crate::filters::{fletcher32, shuffle, unshuffle};
use crate::layout::{AttrValue, DatasetLayout};

// ── Image ───────────────────────────────────────────────────────

struct Dataset {
    layout: DatasetLayout,
    /// Filtered chunk bytes; `None` until first written (reads as zeros).
    chunks: Vec<Option<Vec<u8>>>,
}

enum Node {
    Group,
    Dataset(Dataset),
}

struct Object {
    node: Node,
    attrs: IndexMap<String, AttrValue>,
}

struct FileImage {
    objects: IndexMap<String, Object>,
}

impl FileImage {
    fn new() -> Self {
        let mut objects = IndexMap::new();
        objects.insert(
            "/".to_string(),
            Object {
                node: Node::Group,
                attrs: IndexMap::new(),
            },
        );
        Self { objects }
    }

    fn object(&self, path: &str) -> Result<&Object, StoreError> {
        self.objects.get(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_string(),
        })
    }

    fn object_mut(&mut self, path: &str) -> Result<&mut Object, StoreError> {
        self.objects
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    fn dataset(&self, path: &str) -> Result<&Dataset, StoreError> {
        match &self.object(path)?.node {
            Node::Dataset(d) => Ok(d),
            Node::Group => Err(StoreError::WrongKind {
                path: path.to_string(),
                expected: "dataset",
            }),
        }
    }

    fn dataset_mut(&mut self, path: &str) -> Result<&mut Dataset, StoreError> {
        match &mut self.object_mut(path)?.node {
            Node::Dataset(d) => Ok(d),
            Node::Group => Err(StoreError::WrongKind {
                path: path.to_string(),
                expected: "dataset",
            }),
        }
    }

    fn insert(&mut self, path: String, node: Node) -> Result<(), StoreError> {
        if self.objects.contains_key(&path) {
            return Err(StoreError::AlreadyExists { path });
        }
        let parent = parent_path(&path);
        match self.objects.get(parent) {
            Some(Object {
                node: Node::Group, ..
            }) => {}
            Some(_) => {
                return Err(StoreError::WrongKind {
                    path: parent.to_string(),
                    expected: "group",
                })
            }
            None => {
                return Err(StoreError::NotFound {
                    path: parent.to_string(),
                })
            }
        }
        self.objects.insert(
            path,
            Object {
                node,
                attrs: IndexMap::new(),
            },
        );
        Ok(())
    }
}

impl Dataset {
    fn chunk_bytes(&self) -> usize {
        self.layout.chunk_rows() as usize * self.layout.row_bytes()
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        let mut out = if self.layout.shuffle {
            shuffle(raw, self.layout.element.size())
        } else {
            raw.to_vec()
        };
        if self.layout.fletcher32 {
            let sum = fletcher32(&out);
            out.extend_from_slice(&sum.to_le_bytes());
        }
        out
    }

    fn decode(&self, path: &str, index: usize) -> Result<Vec<u8>, StoreError> {
        let Some(stored) = &self.chunks[index] else {
            return Ok(vec![0u8; self.chunk_bytes()]);
        };
        let body = if self.layout.fletcher32 {
            let split = stored.len().saturating_sub(4);
            let (body, trailer) = stored.split_at(split);
            let mut sum = [0u8; 4];
            sum.copy_from_slice(trailer);
            if fletcher32(body) != u32::from_le_bytes(sum) {
                return Err(StoreError::ChecksumMismatch {
                    path: path.to_string(),
                    chunk: index,
                });
            }
            body
        } else {
            stored.as_slice()
        };
        Ok(if self.layout.shuffle {
            unshuffle(body, self.layout.element.size())
        } else {
            body.to_vec()
        })
    }
}

// ── Store ───────────────────────────────────────────────────────

/// Containers held in process memory, shared between clones.
#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<FileImage>>>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<Mutex<FileImage>>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, path: &Path, writable: bool) -> Result<Box<dyn ContainerFile>, StoreError> {
        let image = self
            .files()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.display().to_string(),
            })?;
        Ok(Box::new(MemoryFile {
            path: path.to_path_buf(),
            image,
            writable,
        }))
    }

    /// Paths of every container in the store.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Overwrite one stored byte of a dataset chunk.
    ///
    /// Exists to exercise checksum verification.
    #[doc(hidden)]
    pub fn corrupt_chunk_byte(
        &self,
        file: &Path,
        dataset: &str,
        chunk: usize,
        byte: usize,
    ) -> Result<(), StoreError> {
        let image = self
            .files()
            .get(file)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: file.display().to_string(),
            })?;
        let mut image = image.lock().unwrap_or_else(PoisonError::into_inner);
        let path = normalize_path(dataset);
        let ds = image.dataset_mut(&path)?;
        let stored = ds
            .chunks
            .get_mut(chunk)
            .and_then(Option::as_mut)
            .ok_or(StoreError::NotFound { path })?;
        if let Some(b) = stored.get_mut(byte) {
            *b ^= 0xff;
        }
        Ok(())
    }
}

impl StructuredStore for MemoryStore {
    fn create(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError> {
        let image = Arc::new(Mutex::new(FileImage::new()));
        self.files().insert(path.to_path_buf(), Arc::clone(&image));
        tracing::debug!(path = %path.display(), "created in-memory container");
        Ok(Box::new(MemoryFile {
            path: path.to_path_buf(),
            image,
            writable: true,
        }))
    }

    fn open_rw(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError> {
        self.open(path, true)
    }

    fn open_ro(&self, path: &Path) -> Result<Box<dyn ContainerFile>, StoreError> {
        self.open(path, false)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }
}

// ── Handle ──────────────────────────────────────────────────────

struct MemoryFile {
    path: PathBuf,
    image: Arc<Mutex<FileImage>>,
    writable: bool,
}

impl MemoryFile {
    fn image(&self) -> MutexGuard<'_, FileImage> {
        self.image.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly {
                path: self.path.display().to_string(),
            });
        }
        Ok(())
    }
}

impl ContainerFile for MemoryFile {
    fn create_group(&mut self, path: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.image().insert(normalize_path(path), Node::Group)
    }

    fn has_group(&self, path: &str) -> bool {
        matches!(
            self.image().objects.get(&normalize_path(path)),
            Some(Object {
                node: Node::Group,
                ..
            })
        )
    }

    fn has_dataset(&self, path: &str) -> bool {
        matches!(
            self.image().objects.get(&normalize_path(path)),
            Some(Object {
                node: Node::Dataset(_),
                ..
            })
        )
    }

    fn write_attribute(
        &mut self,
        object: &str,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut image = self.image();
        let obj = image.object_mut(&normalize_path(object))?;
        obj.attrs.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn read_attribute(&self, object: &str, name: &str) -> Result<AttrValue, StoreError> {
        let path = normalize_path(object);
        let image = self.image();
        image
            .object(&path)?
            .attrs
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: format!("{path}@{name}"),
            })
    }

    fn has_attribute(&self, object: &str, name: &str) -> bool {
        self.image()
            .objects
            .get(&normalize_path(object))
            .is_some_and(|o| o.attrs.contains_key(name))
    }

    fn attribute_names(&self, object: &str) -> Result<Vec<String>, StoreError> {
        let image = self.image();
        Ok(image
            .object(&normalize_path(object))?
            .attrs
            .keys()
            .cloned()
            .collect())
    }

    fn create_dataset(&mut self, path: &str, layout: &DatasetLayout) -> Result<(), StoreError> {
        self.check_writable()?;
        layout.validate()?;
        let chunk_count = layout.row_count().div_ceil(layout.chunk_rows()) as usize;
        self.image().insert(
            normalize_path(path),
            Node::Dataset(Dataset {
                layout: layout.clone(),
                chunks: vec![None; chunk_count],
            }),
        )
    }

    fn dataset_layout(&self, path: &str) -> Result<DatasetLayout, StoreError> {
        Ok(self.image().dataset(&normalize_path(path))?.layout.clone())
    }

    fn write_rows(&mut self, path: &str, row_offset: u64, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        let path = normalize_path(path);
        let mut image = self.image();
        let ds = image.dataset_mut(&path)?;
        let row_bytes = ds.layout.row_bytes();
        if row_bytes == 0 || bytes.len() % row_bytes != 0 {
            return Err(StoreError::RaggedBuffer {
                path,
                bytes: bytes.len(),
                row_bytes,
            });
        }
        let rows = (bytes.len() / row_bytes) as u64;
        check_bounds(&path, row_offset, rows, ds.layout.row_count())?;

        let chunk_rows = ds.layout.chunk_rows();
        let mut row = row_offset;
        let end = row_offset + rows;
        while row < end {
            let index = (row / chunk_rows) as usize;
            let chunk_start = index as u64 * chunk_rows;
            let take = (chunk_start + chunk_rows).min(end) - row;
            let mut raw = ds.decode(&path, index)?;
            let dst = (row - chunk_start) as usize * row_bytes;
            let src = (row - row_offset) as usize * row_bytes;
            let len = take as usize * row_bytes;
            raw[dst..dst + len].copy_from_slice(&bytes[src..src + len]);
            ds.chunks[index] = Some(ds.encode(&raw));
            row += take;
        }
        Ok(())
    }

    fn read_rows(&self, path: &str, row_offset: u64, rows: u64) -> Result<Vec<u8>, StoreError> {
        let path = normalize_path(path);
        let image = self.image();
        let ds = image.dataset(&path)?;
        check_bounds(&path, row_offset, rows, ds.layout.row_count())?;

        let row_bytes = ds.layout.row_bytes();
        let chunk_rows = ds.layout.chunk_rows();
        let mut out = Vec::with_capacity(rows as usize * row_bytes);
        let mut row = row_offset;
        let end = row_offset + rows;
        while row < end {
            let index = (row / chunk_rows) as usize;
            let chunk_start = index as u64 * chunk_rows;
            let take = (chunk_start + chunk_rows).min(end) - row;
            let raw = ds.decode(&path, index)?;
            let from = (row - chunk_start) as usize * row_bytes;
            out.extend_from_slice(&raw[from..from + take as usize * row_bytes]);
            row += take;
        }
        Ok(out)
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
