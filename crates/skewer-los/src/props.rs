//! Sightline run configuration.

use skewer_core::{ConfigError, Parameters};

use crate::sightline::Plane;

/// Longest basename the restart block can hold, excluding its NUL.
pub const MAX_BASENAME_LEN: usize = 199;

const SECTION: &str = "LineOfSight";

/// How many sightlines to draw in each plane, where, and where to write them.
#[derive(Clone, Debug, PartialEq)]
pub struct LosProps {
    /// Sightlines in the XY plane, shot along z.
    pub num_along_xy: u32,
    /// Sightlines in the YZ plane, shot along x.
    pub num_along_yz: u32,
    /// Sightlines in the XZ plane, shot along y.
    pub num_along_xz: u32,
    /// Lower bound of the sightline positions, per axis.
    pub min: [f64; 3],
    /// Upper bound of the sightline positions, per axis.
    pub max: [f64; 3],
    /// Output files are named `{basename}_{index:04}.hdf5`.
    pub basename: String,
}

impl LosProps {
    /// Read `LineOfSight:*` parameters for a box of extent `dim`.
    ///
    /// Counts default to 0 and bounds to the whole box; `basename` is
    /// compulsory.
    pub fn from_params(params: &Parameters, dim: [f64; 3]) -> Result<Self, ConfigError> {
        let key = |name: &str| format!("{SECTION}:{name}");
        let props = Self {
            num_along_xy: params.get_or(&key("num_along_xy"), 0)?,
            num_along_yz: params.get_or(&key("num_along_yz"), 0)?,
            num_along_xz: params.get_or(&key("num_along_xz"), 0)?,
            min: [
                params.get_or(&key("xmin"), 0.0)?,
                params.get_or(&key("ymin"), 0.0)?,
                params.get_or(&key("zmin"), 0.0)?,
            ],
            max: [
                params.get_or(&key("xmax"), dim[0])?,
                params.get_or(&key("ymax"), dim[1])?,
                params.get_or(&key("zmax"), dim[2])?,
            ],
            basename: params.get_string(&key("basename"))?,
        };
        props.validate()?;
        Ok(props)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Basename must be non-empty and fit the restart block.
        if self.basename.is_empty() {
            return Err(ConfigError::InvalidParameter {
                key: format!("{SECTION}:basename"),
                value: String::new(),
                reason: "basename is empty".into(),
            });
        }
        if self.basename.len() > MAX_BASENAME_LEN || self.basename.contains('\0') {
            return Err(ConfigError::InvalidParameter {
                key: format!("{SECTION}:basename"),
                value: self.basename.clone(),
                reason: format!("basename must be at most {MAX_BASENAME_LEN} bytes without NULs"),
            });
        }
        // 2. Bounds must be finite and ordered.
        for (axis, name) in ["x", "y", "z"].iter().enumerate() {
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ConfigError::InvalidParameter {
                    key: format!("{SECTION}:{name}min"),
                    value: format!("{lo}..{hi}"),
                    reason: "bounds must be finite with min <= max".into(),
                });
            }
        }
        // 3. Total must fit a 32-bit signed count.
        if i32::try_from(self.num_total()).is_err() {
            return Err(ConfigError::InvalidConfig {
                reason: format!("{} sightlines exceed the supported count", self.num_total()),
            });
        }
        Ok(())
    }

    /// Number of sightlines in `plane`.
    pub fn count(&self, plane: Plane) -> u32 {
        match plane {
            Plane::Xy => self.num_along_xy,
            Plane::Yz => self.num_along_yz,
            Plane::Xz => self.num_along_xz,
        }
    }

    /// Number of sightlines over all planes.
    pub fn num_total(&self) -> u64 {
        Plane::ALL.iter().map(|&p| u64::from(self.count(p))).sum()
    }
}
