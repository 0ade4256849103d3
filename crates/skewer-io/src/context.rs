//! Run-wide metadata and writer configuration.

use skewer_core::{ConfigError, Parameters, UnitSystem};
use skewer_store::AttrValue;

use crate::collective::CollectiveMode;

/// Everything the time-stepping engine tells the writer about the run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunContext {
    /// Simulation time in internal units.
    pub time: f64,
    /// Cosmological scale factor `a`.
    pub scale_factor: f64,
    /// Redshift `z`.
    pub redshift: f64,
    /// Box extent in internal units.
    pub box_size: [f64; 3],
    /// Whether the box wraps around.
    pub periodic: bool,
    /// Spatial dimensionality.
    pub dimension: i32,
    /// Units the particle data is held in.
    pub internal_units: UnitSystem,
    /// Units written to disk.
    pub output_units: UnitSystem,
    /// Human-readable run name.
    pub run_name: String,
    /// Code identifier.
    pub code_name: String,
    /// Whether initial conditions carry entropy instead of energy.
    pub entropy_ics: bool,
    /// Runtime parameters, echoed into `/Parameters`.
    pub params: Parameters,
    /// Attributes of the hydrodynamics scheme, written to `/HydroScheme`.
    pub scheme: Vec<(String, AttrValue)>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            time: 0.0,
            scale_factor: 1.0,
            redshift: 0.0,
            box_size: [1.0; 3],
            periodic: true,
            dimension: 3,
            internal_units: UnitSystem::cgs(),
            output_units: UnitSystem::cgs(),
            run_name: String::new(),
            code_name: "SWIFT".into(),
            entropy_ics: false,
            params: Parameters::new(),
            scheme: Vec::new(),
        }
    }
}

/// How datasets are laid out and moved into the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    /// Deflate level; 0 disables shuffle and deflate.
    pub compression: u8,
    /// Largest chunk along the row axis.
    pub max_chunk_rows: u64,
    /// Collective strategy.
    pub mode: CollectiveMode,
}

impl WriterConfig {
    /// Chunk ceiling used for snapshot datasets.
    pub const SNAPSHOT_CHUNK_ROWS: u64 = 1 << 16;
    /// Chunk ceiling used for sightline datasets.
    pub const LINE_OF_SIGHT_CHUNK_ROWS: u64 = 1 << 20;

    /// Defaults for snapshot output.
    pub fn snapshot() -> Self {
        Self {
            compression: 0,
            max_chunk_rows: Self::SNAPSHOT_CHUNK_ROWS,
            mode: CollectiveMode::RoundRobin,
        }
    }

    /// Defaults for sightline output.
    pub fn line_of_sight() -> Self {
        Self {
            compression: 0,
            max_chunk_rows: Self::LINE_OF_SIGHT_CHUNK_ROWS,
            mode: CollectiveMode::Gather,
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Deflate levels run 0..=9.
        if self.compression > 9 {
            return Err(ConfigError::InvalidConfig {
                reason: format!("compression level {} above 9", self.compression),
            });
        }
        // 2. Chunks must hold at least one row.
        if self.max_chunk_rows == 0 {
            return Err(ConfigError::InvalidConfig {
                reason: "max_chunk_rows must be positive".into(),
            });
        }
        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        WriterConfig::snapshot().validate().unwrap();
        WriterConfig::line_of_sight().validate().unwrap();
    }

    #[test]
    fn bad_compression_is_rejected() {
        let cfg = WriterConfig {
            compression: 12,
            ..WriterConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidConfig { .. })
        ));
    }
}
