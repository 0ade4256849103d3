//! The particle contract consumed by filtering.

/// A record with a position and an interaction radius.
///
/// The filter reads nothing else; every other field is reached only
/// through field descriptors.
pub trait Particle: Clone + Send + Sync {
    /// Position in internal length units.
    fn position(&self) -> [f64; 3];

    /// Native smoothing length.
    fn smoothing_length(&self) -> f32;

    /// Whether the record is logically deleted.
    fn is_inhibited(&self) -> bool {
        false
    }
}

/// A primary record travelling with its companion extended record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paired<P, X> {
    /// The primary record.
    pub part: P,
    /// The companion record.
    pub extra: X,
}

impl<P, X> Paired<P, X> {
    /// Couple a record with its companion.
    pub fn new(part: P, extra: X) -> Self {
        Self { part, extra }
    }

    /// Borrow the primary record.
    pub fn part(&self) -> &P {
        &self.part
    }

    /// Mutably borrow the primary record.
    pub fn part_mut(&mut self) -> &mut P {
        &mut self.part
    }

    /// Borrow the companion record.
    pub fn extra(&self) -> &X {
        &self.extra
    }

    /// Mutably borrow the companion record.
    pub fn extra_mut(&mut self) -> &mut X {
        &mut self.extra
    }
}

impl<P: Particle, X: Clone + Send + Sync> Particle for Paired<P, X> {
    fn position(&self) -> [f64; 3] {
        self.part.position()
    }

    fn smoothing_length(&self) -> f32 {
        self.part.smoothing_length()
    }

    fn is_inhibited(&self) -> bool {
        self.part.is_inhibited()
    }
}
