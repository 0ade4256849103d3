//! Particle kinds and the storage capability behind each of them.

use skewer_core::{CatalogView, CatalogViewMut, ColumnSink, ColumnSource, FieldCatalog};

/// The six legacy particle-kind slots.
///
/// The discriminant is the `N` of the `/PartTypeN` group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartKind {
    /// Gas, slot 0.
    Gas = 0,
    /// Dark matter, slot 1.
    DarkMatter = 1,
    /// Boundary particles, slot 2.
    Boundary = 2,
    /// Sinks, slot 3.
    Sink = 3,
    /// Stars, slot 4.
    Stars = 4,
    /// Black holes, slot 5.
    BlackHoles = 5,
}

impl PartKind {
    /// Number of kind slots.
    pub const COUNT: usize = 6;

    /// Every kind, in slot order.
    pub const ALL: [PartKind; Self::COUNT] = [
        PartKind::Gas,
        PartKind::DarkMatter,
        PartKind::Boundary,
        PartKind::Sink,
        PartKind::Stars,
        PartKind::BlackHoles,
    ];

    /// Slot index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The group holding this kind's datasets.
    pub fn group_name(self) -> String {
        format!("/PartType{}", self.index())
    }
}

/// Storage for the local particles of one kind.
///
/// Writers pull columns from [`source`](Self::source); readers
/// [`resize`](Self::resize) and push columns into [`sink`](Self::sink).
pub trait KindStorage {
    /// The kind stored.
    fn kind(&self) -> PartKind;

    /// Number of local records.
    fn len(&self) -> usize;

    /// Whether there are no local records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize to `len` default records.
    fn resize(&mut self, len: usize);

    /// Column view for writing.
    fn source(&self) -> Box<dyn ColumnSource + '_>;

    /// Column view for reading.
    fn sink(&mut self) -> Box<dyn ColumnSink + '_>;
}

/// A catalog paired with the records it describes.
#[derive(Clone, Debug)]
pub struct ParticleArray<R> {
    kind: PartKind,
    catalog: FieldCatalog<R>,
    records: Vec<R>,
}

impl<R> ParticleArray<R> {
    /// Pair `records` with the `catalog` describing them.
    pub fn new(kind: PartKind, catalog: FieldCatalog<R>, records: Vec<R>) -> Self {
        Self {
            kind,
            catalog,
            records,
        }
    }

    /// The catalog.
    pub fn catalog(&self) -> &FieldCatalog<R> {
        &self.catalog
    }

    /// The records.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Take the records out, leaving the array empty.
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R: Default + Clone + 'static> KindStorage for ParticleArray<R> {
    fn kind(&self) -> PartKind {
        self.kind
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn resize(&mut self, len: usize) {
        self.records.clear();
        self.records.resize(len, R::default());
    }

    fn source(&self) -> Box<dyn ColumnSource + '_> {
        Box::new(CatalogView::new(&self.catalog, &self.records))
    }

    fn sink(&mut self) -> Box<dyn ColumnSink + '_> {
        Box::new(CatalogViewMut::new(&self.catalog, &mut self.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_names_follow_slots() {
        assert_eq!(PartKind::Gas.group_name(), "/PartType0");
        assert_eq!(PartKind::BlackHoles.group_name(), "/PartType5");
        for (i, k) in PartKind::ALL.iter().enumerate() {
            assert_eq!(k.index(), i);
        }
    }

    #[test]
    fn resize_resets_records() {
        let mut arr = ParticleArray::new(PartKind::Stars, FieldCatalog::<u32>::new(), vec![7, 8]);
        arr.resize(3);
        assert_eq!(arr.records(), &[0, 0, 0]);
        assert_eq!(arr.source().rows(), 3);
    }
}
