//! Dataset layouts and attribute values.

use smallvec::{smallvec, SmallVec};

use skewer_core::ElementType;

use crate::error::StoreError;

/// Shape, chunking and filters of a dataset.
///
/// Datasets are `[rows]` for scalar fields or `[rows, dim]` for vector
/// fields, chunked along the leading axis only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetLayout {
    /// Element type of every value.
    pub element: ElementType,
    /// Dataset extent.
    pub shape: SmallVec<[u64; 2]>,
    /// Chunk extent; same rank as `shape`.
    pub chunk: SmallVec<[u64; 2]>,
    /// Store a Fletcher-32 checksum with every chunk.
    pub fletcher32: bool,
    /// Byte-shuffle each chunk before compression.
    pub shuffle: bool,
    /// Deflate level, if compressed.
    pub deflate: Option<u8>,
}

impl DatasetLayout {
    /// A row-chunked layout for `rows` rows of `dim` values.
    ///
    /// The chunk extent is `max_chunk_rows` clipped to `rows`. Checksums
    /// are always on; shuffle and deflate are enabled when
    /// `compression > 0`.
    pub fn rows(
        element: ElementType,
        rows: u64,
        dim: usize,
        max_chunk_rows: u64,
        compression: u8,
    ) -> Self {
        let chunk_rows = max_chunk_rows.min(rows).max(1);
        let (shape, chunk) = if dim == 1 {
            (smallvec![rows], smallvec![chunk_rows])
        } else {
            (smallvec![rows, dim as u64], smallvec![chunk_rows, dim as u64])
        };
        Self {
            element,
            shape,
            chunk,
            fletcher32: true,
            shuffle: compression > 0,
            deflate: (compression > 0).then_some(compression),
        }
    }

    /// Number of rows (the leading extent).
    pub fn row_count(&self) -> u64 {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Values per row.
    pub fn dim(&self) -> usize {
        self.shape.get(1).map_or(1, |&d| d as usize)
    }

    /// Bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.element.size() * self.dim()
    }

    /// Rows per chunk.
    pub fn chunk_rows(&self) -> u64 {
        self.chunk.first().copied().unwrap_or(1)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.shape.is_empty() || self.shape.len() > 2 {
            return Err(StoreError::InvalidLayout {
                reason: format!("rank {} is not 1 or 2", self.shape.len()),
            });
        }
        if self.chunk.len() != self.shape.len() {
            return Err(StoreError::InvalidLayout {
                reason: "chunk rank differs from dataset rank".into(),
            });
        }
        if self.chunk.iter().any(|&c| c == 0) {
            return Err(StoreError::InvalidLayout {
                reason: "chunk extent must be positive".into(),
            });
        }
        if self.shape.len() == 2 && self.chunk[1] != self.shape[1] {
            return Err(StoreError::InvalidLayout {
                reason: "chunks must span the whole row".into(),
            });
        }
        if let Some(level) = self.deflate {
            if level > 9 {
                return Err(StoreError::InvalidLayout {
                    reason: format!("deflate level {level} above 9"),
                });
            }
        }
        Ok(())
    }
}

/// A typed attribute value. Numeric attributes are one-dimensional.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// Signed 32-bit integers.
    I32(Vec<i32>),
    /// Unsigned 32-bit integers.
    U32(Vec<u32>),
    /// Signed 64-bit integers.
    I64(Vec<i64>),
    /// Unsigned 64-bit integers.
    U64(Vec<u64>),
    /// 32-bit floats.
    F32(Vec<f32>),
    /// 64-bit floats.
    F64(Vec<f64>),
    /// A text string.
    Str(String),
}

impl AttrValue {
    /// Number of values (1 for strings).
    pub fn len(&self) -> usize {
        match self {
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Str(_) => 1,
        }
    }

    /// Whether a numeric attribute holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric values widened to `f64`; `None` for strings.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        Some(match self {
            Self::I32(v) => v.iter().map(|&x| x as f64).collect(),
            Self::U32(v) => v.iter().map(|&x| x as f64).collect(),
            Self::I64(v) => v.iter().map(|&x| x as f64).collect(),
            Self::U64(v) => v.iter().map(|&x| x as f64).collect(),
            Self::F32(v) => v.iter().map(|&x| x as f64).collect(),
            Self::F64(v) => v.clone(),
            Self::Str(_) => return None,
        })
    }

    /// Integer values widened to `i64`; `None` for floats and strings.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        Some(match self {
            Self::I32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::U32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::I64(v) => v.clone(),
            Self::U64(v) => v.iter().map(|&x| x as i64).collect(),
            _ => return None,
        })
    }

    /// First numeric value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.to_f64_vec().and_then(|v| v.first().copied())
    }

    /// First integer value as `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.to_i64_vec().and_then(|v| v.first().copied())
    }

    /// The string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Str(_) => "string",
        }
    }
}

macro_rules! attr_from {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl From<$t> for AttrValue {
            fn from(v: $t) -> Self {
                Self::$variant(vec![v])
            }
        }

        impl From<Vec<$t>> for AttrValue {
            fn from(v: Vec<$t>) -> Self {
                Self::$variant(v)
            }
        }

        impl<const N: usize> From<[$t; N]> for AttrValue {
            fn from(v: [$t; N]) -> Self {
                Self::$variant(v.to_vec())
            }
        }
    )*};
}

attr_from!(
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
