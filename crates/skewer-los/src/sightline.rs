//! Random axis-aligned sightlines.

use rand::Rng;

use crate::props::LosProps;

/// The plane a sightline is drawn in. It is shot along the third axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Positions in x and y, shot along z.
    Xy,
    /// Positions in y and z, shot along x.
    Yz,
    /// Positions in x and z, shot along y.
    Xz,
}

impl Plane {
    /// Planes in generation order.
    pub const ALL: [Plane; 3] = [Plane::Xy, Plane::Yz, Plane::Xz];

    /// `[primary, secondary, sweep]` axis indices.
    pub fn axes(self) -> [usize; 3] {
        match self {
            Plane::Xy => [0, 1, 2],
            Plane::Yz => [1, 2, 0],
            Plane::Xz => [0, 2, 1],
        }
    }
}

/// One sightline: a line parallel to the sweep axis through
/// `(xpos, ypos)` in the primary/secondary plane.
#[derive(Clone, Debug, PartialEq)]
pub struct Sightline {
    /// Plane the position was drawn in.
    pub plane: Plane,
    /// Position along the primary axis.
    pub xpos: f64,
    /// Position along the secondary axis.
    pub ypos: f64,
    /// Whether distances wrap around the box.
    pub periodic: bool,
    /// Box extent, for periodic wrapping.
    pub dim: [f64; 3],
    /// Matches held by this rank.
    pub local_count: u64,
    /// Matches over all ranks.
    pub global_count: u64,
}

impl Sightline {
    /// `[primary, secondary, sweep]` axis indices.
    pub fn axes(&self) -> [usize; 3] {
        self.plane.axes()
    }
}

/// The sightlines of one pass: XY first, then YZ, then XZ.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SightlineSet {
    lines: Vec<Sightline>,
}

impl SightlineSet {
    /// Draw `props.count(plane)` sightlines per plane, uniformly within
    /// the configured bounds of the plane's two axes.
    pub fn generate<G: Rng>(
        props: &LosProps,
        periodic: bool,
        dim: [f64; 3],
        rng: &mut G,
    ) -> Self {
        let mut lines = Vec::with_capacity(props.num_total() as usize);
        for plane in Plane::ALL {
            let [a, b, _] = plane.axes();
            for _ in 0..props.count(plane) {
                let xpos = draw(rng, props.min[a], props.max[a]);
                let ypos = draw(rng, props.min[b], props.max[b]);
                lines.push(Sightline {
                    plane,
                    xpos,
                    ypos,
                    periodic,
                    dim,
                    local_count: 0,
                    global_count: 0,
                });
            }
        }
        debug_assert_eq!(lines.len() as u64, props.num_total());
        Self { lines }
    }

    /// Number of sightlines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sightline `index`.
    pub fn get(&self, index: usize) -> Option<&Sightline> {
        self.lines.get(index)
    }

    /// All sightlines in order.
    pub fn as_slice(&self) -> &[Sightline] {
        &self.lines
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sightline> {
        self.lines.iter()
    }

    /// Iterate mutably in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Sightline> {
        self.lines.iter_mut()
    }

    /// Sum of the global counts.
    pub fn total_global(&self) -> u64 {
        self.lines.iter().map(|l| l.global_count).sum()
    }
}

fn draw<G: Rng>(rng: &mut G, lo: f64, hi: f64) -> f64 {
    rng.random::<f64>() * (hi - lo) + lo
}
