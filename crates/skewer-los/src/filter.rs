//! Per-rank selection of the particles overlapping a sightline.
//!
//! A particle overlaps when the distance from its position to the
//! sightline, measured in the sightline's plane, is at most its kernel
//! support `h · γ`. Selection runs twice per sightline: a parallel
//! counting pass, then a serial pass copying matches in array order into
//! a buffer of exactly the counted size.

use skewer_comm::WorkerPool;
use skewer_core::{ConfigError, Particle};

use crate::sightline::Sightline;

/// Wrap a separation `d` onto the nearest periodic image in a box of
/// extent `box_len`.
pub fn nearest(d: f64, box_len: f64) -> f64 {
    if d > 0.5 * box_len {
        d - box_len
    } else if d < -0.5 * box_len {
        d + box_len
    } else {
        d
    }
}

/// Filter tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterConfig {
    /// Kernel support in units of the smoothing length.
    pub kernel_gamma: f64,
    /// Records per counting task; 0 picks a size from the pool width.
    pub chunk_size: usize,
}

impl FilterConfig {
    /// Support radius of the 3D cubic spline kernel.
    pub const CUBIC_SPLINE_GAMMA: f64 = 1.825742;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.kernel_gamma.is_finite() || self.kernel_gamma <= 0.0 {
            return Err(ConfigError::InvalidConfig {
                reason: format!("kernel_gamma must be finite and positive, got {}", self.kernel_gamma),
            });
        }
        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kernel_gamma: Self::CUBIC_SPLINE_GAMMA,
            chunk_size: 0,
        }
    }
}

/// Sightline selection over one rank's records.
#[derive(Clone, Debug)]
pub struct LocalFilter {
    config: FilterConfig,
    pool: WorkerPool,
}

impl LocalFilter {
    /// A filter counting on `pool`.
    pub fn new(config: FilterConfig, pool: WorkerPool) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, pool })
    }

    /// The same filter counting on `pool`.
    pub fn with_pool(self, pool: WorkerPool) -> Self {
        Self { pool, ..self }
    }

    /// The filter configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Whether `p` overlaps `line`. Inhibited records never do.
    pub fn matches<R: Particle>(&self, line: &Sightline, p: &R) -> bool {
        if p.is_inhibited() {
            return false;
        }
        let [a, b, _] = line.axes();
        let x = p.position();
        let hsml = f64::from(p.smoothing_length()) * self.config.kernel_gamma;

        let mut dx = x[a] - line.xpos;
        if line.periodic {
            dx = nearest(dx, line.dim[a]);
        }
        if dx.abs() > hsml {
            return false;
        }
        let mut dy = x[b] - line.ypos;
        if line.periodic {
            dy = nearest(dy, line.dim[b]);
        }
        if dy.abs() > hsml {
            return false;
        }
        dx * dx + dy * dy <= hsml * hsml
    }

    /// Number of records overlapping `line`, counted in parallel.
    pub fn count<R: Particle>(&self, line: &Sightline, records: &[R]) -> u64 {
        let n = self.pool.map_chunks(records, self.config.chunk_size, |chunk| {
            chunk.iter().filter(|p| self.matches(line, *p)).count()
        });
        n as u64
    }

    /// Copies of the records overlapping `line`, in array order.
    ///
    /// `expected` is the result of [`count`](Self::count) and sizes the
    /// buffer; the caller compares it with the returned length.
    pub fn compact<R: Particle>(&self, line: &Sightline, records: &[R], expected: u64) -> Vec<R> {
        let mut out = Vec::with_capacity(expected as usize);
        out.extend(records.iter().filter(|p| self.matches(line, *p)).cloned());
        out
    }
}
