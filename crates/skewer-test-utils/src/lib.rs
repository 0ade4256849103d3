//! Test utilities for Skewer development.
//!
//! Provides fixture particle records with their output-field describers
//! ([`GasParticle`], [`DarkMatterParticle`], [`ChemistryData`]) and seeded
//! scatter helpers for building reproducible particle sets.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    chemistry_fields, dark_matter_catalog, gas_catalog, hydro_fields, paired_catalog,
    ChemistryData, DarkMatterParticle, GasParticle, PairedGas,
};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A deterministic RNG for tests.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `n` gas particles uniformly placed in `[0, box_size)`, all with
/// smoothing length `h`. IDs start at `first_id`.
pub fn scatter_uniform(
    rng: &mut impl Rng,
    n: usize,
    box_size: [f64; 3],
    h: f32,
    first_id: u64,
) -> Vec<GasParticle> {
    (0..n)
        .map(|i| GasParticle {
            x: [
                rng.random::<f64>() * box_size[0],
                rng.random::<f64>() * box_size[1],
                rng.random::<f64>() * box_size[2],
            ],
            v: [rng.random::<f32>() - 0.5, 0.0, 0.0],
            mass: 1.0 + rng.random::<f32>(),
            h,
            u: rng.random::<f32>() * 100.0,
            rho: 0.0,
            id: first_id + i as u64,
            inhibited: false,
        })
        .collect()
}

/// `n` gas particles within `spread` of `center` on every axis.
pub fn scatter_cluster(
    rng: &mut impl Rng,
    n: usize,
    center: [f64; 3],
    spread: f64,
    h: f32,
    first_id: u64,
) -> Vec<GasParticle> {
    (0..n)
        .map(|i| {
            let mut x = center;
            for c in &mut x {
                *c += (rng.random::<f64>() * 2.0 - 1.0) * spread;
            }
            GasParticle {
                x,
                h,
                mass: 1.0,
                id: first_id + i as u64,
                ..GasParticle::default()
            }
        })
        .collect()
}

/// Deal `items` to `ranks` ranks in contiguous, nearly equal blocks.
pub fn split_across_ranks<T: Clone>(items: &[T], ranks: usize) -> Vec<Vec<T>> {
    let ranks = ranks.max(1);
    (0..ranks)
        .map(|r| {
            let start = r * items.len() / ranks;
            let end = (r + 1) * items.len() / ranks;
            items[start..end].to_vec()
        })
        .collect()
}
