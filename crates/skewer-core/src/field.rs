//! Field descriptors, element types, and the [`FieldCatalog`].
//!
//! A field descriptor couples the on-disk metadata of one output quantity
//! with a type-erased accessor into a record type `R`. Accessors write
//! little-endian bytes so the I/O layer never needs to know `R`.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::select::OutputSelection;
use crate::units::UnitConversion;

// ── Element types ───────────────────────────────────────────────

/// Primitive element type of a stored field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Whether the element is a floating-point type.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Short lowercase name, e.g. `"f32"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive that can be stored in a field.
pub trait Element: Copy + Default + Send + Sync + 'static {
    /// The matching [`ElementType`] tag.
    const TYPE: ElementType;

    /// Write `self` as little-endian bytes into `out[..TYPE.size()]`.
    fn put(self, out: &mut [u8]);

    /// Read a value from little-endian `bytes[..TYPE.size()]`.
    fn take(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($t:ty => $tag:ident),* $(,)?) => {$(
        impl Element for $t {
            const TYPE: ElementType = ElementType::$tag;

            fn put(self, out: &mut [u8]) {
                out[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_le_bytes());
            }

            fn take(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(buf)
            }
        }
    )*};
}

impl_element!(
    u8 => U8,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

// ── Descriptors ─────────────────────────────────────────────────

/// Whether a field must be present in an input file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Importance {
    /// Absence aborts the read.
    Compulsory,
    /// Absence reads back as zeros.
    Optional,
}

/// Metadata describing one stored field, independent of the record type.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMeta {
    /// Dataset name; unique within a catalog.
    pub name: String,
    /// Primitive element type.
    pub element: ElementType,
    /// Vector width (1 for scalars).
    pub dim: usize,
    /// Physical quantity, used for unit conversion and attributes.
    pub units: UnitConversion,
    /// Exponent of the cosmological scale factor.
    pub a_exponent: f32,
    /// Compulsory or optional on read.
    pub importance: Importance,
    /// Human-readable description written as an attribute.
    pub description: String,
}

impl FieldMeta {
    /// Bytes occupied by one record's value of this field.
    pub fn record_bytes(&self) -> usize {
        self.element.size() * self.dim
    }
}

type Getter<R> = Arc<dyn Fn(&R, &mut [u8]) + Send + Sync>;
type Setter<R> = Arc<dyn Fn(&mut R, &[u8]) + Send + Sync>;

/// A named, typed view of one quantity inside records of type `R`.
///
/// # Examples
///
/// ```
/// use skewer_core::{FieldDescriptor, UnitConversion};
///
/// struct Gas { mass: f32, vel: [f32; 3] }
///
/// let mass = FieldDescriptor::<Gas>::scalar("Masses", UnitConversion::Mass, "Particle masses", |g| g.mass);
/// let vel = FieldDescriptor::<Gas>::vector("Velocities", UnitConversion::Speed, "Peculiar velocities", |g| g.vel)
///     .a_exponent(1.0);
///
/// let recs = [Gas { mass: 2.0, vel: [1.0, 2.0, 3.0] }];
/// assert_eq!(mass.gather(&recs), 2.0f32.to_le_bytes().to_vec());
/// assert_eq!(vel.meta().dim, 3);
/// ```
pub struct FieldDescriptor<R> {
    meta: FieldMeta,
    get: Getter<R>,
    set: Option<Setter<R>>,
}

impl<R> Clone for FieldDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            get: Arc::clone(&self.get),
            set: self.set.clone(),
        }
    }
}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("meta", &self.meta)
            .field("writable", &self.set.is_some())
            .finish()
    }
}

impl<R: 'static> FieldDescriptor<R> {
    /// A write-only scalar field.
    pub fn scalar<T: Element>(
        name: impl Into<String>,
        units: UnitConversion,
        description: impl Into<String>,
        get: impl Fn(&R) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            meta: Self::base_meta(name.into(), T::TYPE, 1, units, description.into()),
            get: Arc::new(move |r: &R, out: &mut [u8]| get(r).put(out)),
            set: None,
        }
    }

    /// A write-only vector field of width `D`.
    pub fn vector<T: Element, const D: usize>(
        name: impl Into<String>,
        units: UnitConversion,
        description: impl Into<String>,
        get: impl Fn(&R) -> [T; D] + Send + Sync + 'static,
    ) -> Self {
        let size = T::TYPE.size();
        Self {
            meta: Self::base_meta(name.into(), T::TYPE, D, units, description.into()),
            get: Arc::new(move |r: &R, out: &mut [u8]| {
                for (v, slot) in get(r).into_iter().zip(out.chunks_exact_mut(size)) {
                    v.put(slot);
                }
            }),
            set: None,
        }
    }

    /// A scalar field that can also be read back into records.
    pub fn scalar_rw<T: Element>(
        name: impl Into<String>,
        units: UnitConversion,
        description: impl Into<String>,
        get: impl Fn(&R) -> T + Send + Sync + 'static,
        set: impl Fn(&mut R, T) + Send + Sync + 'static,
    ) -> Self {
        let mut desc = Self::scalar(name, units, description, get);
        desc.set = Some(Arc::new(move |r: &mut R, bytes: &[u8]| set(r, T::take(bytes))));
        desc
    }

    /// A vector field of width `D` that can also be read back into records.
    pub fn vector_rw<T: Element, const D: usize>(
        name: impl Into<String>,
        units: UnitConversion,
        description: impl Into<String>,
        get: impl Fn(&R) -> [T; D] + Send + Sync + 'static,
        set: impl Fn(&mut R, [T; D]) + Send + Sync + 'static,
    ) -> Self {
        let size = T::TYPE.size();
        let mut desc = Self::vector(name, units, description, get);
        desc.set = Some(Arc::new(move |r: &mut R, bytes: &[u8]| {
            let mut value = [T::default(); D];
            for (v, chunk) in value.iter_mut().zip(bytes.chunks_exact(size)) {
                *v = T::take(chunk);
            }
            set(r, value);
        }));
        desc
    }

    /// Re-target this descriptor at a record type `S` that contains an `R`.
    ///
    /// Used to describe companion records travelling alongside a primary
    /// record, e.g. the extended half of a [`Paired`](crate::Paired).
    pub fn lift<S: 'static>(
        self,
        project: fn(&S) -> &R,
        project_mut: fn(&mut S) -> &mut R,
    ) -> FieldDescriptor<S> {
        let get = self.get;
        let set = self.set.map(|set| -> Setter<S> {
            Arc::new(move |s: &mut S, bytes: &[u8]| set(project_mut(s), bytes))
        });
        FieldDescriptor {
            meta: self.meta,
            get: Arc::new(move |s: &S, out: &mut [u8]| get(project(s), out)),
            set,
        }
    }

    fn base_meta(
        name: String,
        element: ElementType,
        dim: usize,
        units: UnitConversion,
        description: String,
    ) -> FieldMeta {
        FieldMeta {
            name,
            element,
            dim,
            units,
            a_exponent: 0.0,
            importance: Importance::Compulsory,
            description,
        }
    }
}

impl<R> FieldDescriptor<R> {
    /// Set the cosmological scale-factor exponent.
    pub fn a_exponent(mut self, exponent: f32) -> Self {
        self.meta.a_exponent = exponent;
        self
    }

    /// Mark the field optional on read.
    pub fn optional(mut self) -> Self {
        self.meta.importance = Importance::Optional;
        self
    }

    /// The field's metadata.
    pub fn meta(&self) -> &FieldMeta {
        &self.meta
    }

    /// The field's name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Whether records can receive this field on read.
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Pack this field of every record into a contiguous little-endian buffer.
    pub fn gather(&self, records: &[R]) -> Vec<u8> {
        let stride = self.meta.record_bytes();
        let mut out = vec![0u8; stride * records.len()];
        if stride == 0 {
            return out;
        }
        for (rec, slot) in records.iter().zip(out.chunks_exact_mut(stride)) {
            (self.get)(rec, slot);
        }
        out
    }

    /// Unpack a contiguous buffer into this field of each record.
    ///
    /// `bytes` must hold exactly `records.len()` values.
    pub fn scatter(&self, records: &mut [R], bytes: &[u8]) -> Result<(), ConfigError> {
        let set = self.set.as_ref().ok_or_else(|| ConfigError::ReadOnlyField {
            name: self.meta.name.clone(),
        })?;
        let stride = self.meta.record_bytes();
        if bytes.len() != stride * records.len() {
            return Err(ConfigError::InvalidField {
                name: self.meta.name.clone(),
                reason: format!(
                    "buffer of {} bytes does not hold {} records of {stride} bytes",
                    bytes.len(),
                    records.len()
                ),
            });
        }
        if stride == 0 {
            return Ok(());
        }
        for (rec, chunk) in records.iter_mut().zip(bytes.chunks_exact(stride)) {
            set(rec, chunk);
        }
        Ok(())
    }

    /// Set this field of every record to zero.
    pub fn zero_fill(&self, records: &mut [R]) -> Result<(), ConfigError> {
        let zeros = vec![0u8; self.meta.record_bytes() * records.len()];
        self.scatter(records, &zeros)
    }
}

// ── Catalog ─────────────────────────────────────────────────────

/// Ordered collection of field descriptors with unique names.
///
/// Order is the dataset creation order. The catalog grows without a
/// fixed cap; an optional upper bound can be configured.
pub struct FieldCatalog<R> {
    fields: Vec<FieldDescriptor<R>>,
    limit: Option<usize>,
}

impl<R> Default for FieldCatalog<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for FieldCatalog<R> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            limit: self.limit,
        }
    }
}

impl<R> fmt::Debug for FieldCatalog<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|d| d.name()))
            .finish()
    }
}

impl<R> FieldCatalog<R> {
    /// Create an empty, unbounded catalog.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            limit: None,
        }
    }

    /// Create an empty catalog that rejects more than `limit` fields.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            fields: Vec::with_capacity(limit.min(128)),
            limit: Some(limit),
        }
    }

    /// Append a descriptor.
    ///
    /// Rejects empty names, zero vector width, duplicate names, and
    /// exceeding the configured limit.
    pub fn push(&mut self, field: FieldDescriptor<R>) -> Result<(), ConfigError> {
        let meta = field.meta();
        if meta.name.is_empty() {
            return Err(ConfigError::InvalidField {
                name: String::new(),
                reason: "field name is empty".into(),
            });
        }
        if meta.dim == 0 {
            return Err(ConfigError::InvalidField {
                name: meta.name.clone(),
                reason: "vector width must be at least 1".into(),
            });
        }
        if self.position(&meta.name).is_some() {
            return Err(ConfigError::DuplicateField {
                name: meta.name.clone(),
            });
        }
        if let Some(limit) = self.limit {
            if self.fields.len() >= limit {
                return Err(ConfigError::TooManyFields { limit });
            }
        }
        self.fields.push(field);
        Ok(())
    }

    /// Build a catalog by asking each describer in turn.
    pub fn assemble(describers: &[&dyn FieldDescriber<R>]) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        for d in describers {
            d.describe_output_fields(&mut catalog)?;
        }
        Ok(catalog)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the catalog holds no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The field at `index`, if any.
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor<R>> {
        self.fields.get(index)
    }

    /// The field named `name`, if any.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<R>> {
        self.fields.iter().find(|d| d.name() == name)
    }

    /// Index of the field named `name`, if any.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|d| d.name() == name)
    }

    /// Iterate over descriptors in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor<R>> {
        self.fields.iter()
    }

    /// Iterate over the descriptors the selection policy enables.
    pub fn enabled<'a>(
        &'a self,
        selection: &'a dyn OutputSelection,
    ) -> impl Iterator<Item = &'a FieldDescriptor<R>> + 'a {
        self.fields
            .iter()
            .filter(move |d| selection.is_field_enabled(d.name()))
    }
}

impl<'a, R> IntoIterator for &'a FieldCatalog<R> {
    type Item = &'a FieldDescriptor<R>;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// A module that contributes output fields for records of type `R`.
pub trait FieldDescriber<R> {
    /// Append this module's fields to `catalog`, returning how many were added.
    fn describe_output_fields(&self, catalog: &mut FieldCatalog<R>) -> Result<usize, ConfigError>;
}

impl<R, F> FieldDescriber<R> for F
where
    F: Fn(&mut FieldCatalog<R>) -> Result<usize, ConfigError>,
{
    fn describe_output_fields(&self, catalog: &mut FieldCatalog<R>) -> Result<usize, ConfigError> {
        self(catalog)
    }
}
