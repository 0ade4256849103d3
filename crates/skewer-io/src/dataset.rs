//! Dataset declaration, hyperslab writes and reads.
//!
//! Datasets are written in the output unit system and read back into the
//! internal one. Both directions skip conversion when the factor is
//! exactly 1, so identical systems round-trip byte for byte.

use skewer_core::{BaseUnit, ColumnSink, ConfigError, FieldMeta, Importance, UnitSystem};
use skewer_store::{AttrValue, ContainerFile, DatasetLayout};

use crate::context::RunContext;
use crate::convert::scale_in_place;
use crate::error::OutputError;

/// Attribute holding the physical CGS conversion factor.
pub const ATTR_FACTOR_PHYSICAL: &str =
    "Conversion factor to physical CGS (including cosmological corrections)";
/// Attribute holding the comoving CGS conversion factor.
pub const ATTR_FACTOR_CGS: &str = "Conversion factor to CGS (not including cosmological corrections)";
/// Attribute holding the human-readable unit expression.
pub const ATTR_EXPRESSION: &str = "Expression for physical CGS units";
/// Attribute holding the field description.
pub const ATTR_DESCRIPTION: &str = "Description";

/// Join a group path and a field name.
pub fn dataset_path(group: &str, name: &str) -> String {
    format!("{}/{}", group.trim_end_matches('/'), name)
}

/// Reject fields that cannot be written as described.
///
/// Called on every rank before any collective so that all ranks fail the
/// same way.
pub fn check_writable(meta: &FieldMeta, ctx: &RunContext) -> Result<(), ConfigError> {
    if meta.description.trim().is_empty() {
        return Err(ConfigError::EmptyDescription {
            name: meta.name.clone(),
        });
    }
    let factor = ctx
        .internal_units
        .conversion_factor_to(&ctx.output_units, meta.units);
    if factor != 1.0 && !meta.element.is_float() {
        return Err(ConfigError::IntegerConversion {
            name: meta.name.clone(),
            factor,
        });
    }
    Ok(())
}

/// Create the dataset for `meta` under `group`, sized for `rows` rows, and
/// attach its unit attributes. Returns the dataset path.
pub fn declare_dataset(
    file: &mut dyn ContainerFile,
    group: &str,
    meta: &FieldMeta,
    rows: u64,
    max_chunk_rows: u64,
    compression: u8,
    ctx: &RunContext,
) -> Result<String, OutputError> {
    check_writable(meta, ctx)?;
    let path = dataset_path(group, &meta.name);
    let layout = DatasetLayout::rows(meta.element, rows, meta.dim, max_chunk_rows, compression);
    file.create_dataset(&path, &layout)?;

    let units = &ctx.output_units;
    let exponents = meta.units.exponents();
    for unit in BaseUnit::ALL {
        let name = format!("{} exponent", unit.code_symbol());
        file.write_attribute(&path, &name, &AttrValue::from(exponents[unit.index()]))?;
    }
    file.write_attribute(&path, "h-scale exponent", &AttrValue::from(0.0f32))?;
    file.write_attribute(&path, "a-scale exponent", &AttrValue::from(meta.a_exponent))?;
    file.write_attribute(
        &path,
        ATTR_EXPRESSION,
        &AttrValue::from(units.cgs_conversion_string(meta.units, meta.a_exponent)),
    )?;
    let factor = units.cgs_conversion_factor(meta.units);
    file.write_attribute(&path, ATTR_FACTOR_CGS, &AttrValue::from(factor))?;
    let physical = factor * ctx.scale_factor.powf(f64::from(meta.a_exponent));
    file.write_attribute(&path, ATTR_FACTOR_PHYSICAL, &AttrValue::from(physical))?;
    file.write_attribute(&path, ATTR_DESCRIPTION, &AttrValue::from(meta.description.as_str()))?;
    Ok(path)
}

/// Convert `bytes` from internal to output units and write them as rows
/// starting at `row_offset`.
pub fn write_subrange(
    file: &mut dyn ContainerFile,
    path: &str,
    meta: &FieldMeta,
    mut bytes: Vec<u8>,
    row_offset: u64,
    ctx: &RunContext,
) -> Result<(), OutputError> {
    let factor = ctx
        .internal_units
        .conversion_factor_to(&ctx.output_units, meta.units);
    scale_in_place(meta, &mut bytes, factor)?;
    file.write_rows(path, row_offset, &bytes)?;
    Ok(())
}

/// Whether `name` exists as a dataset under `group`.
pub fn field_exists(file: &dyn ContainerFile, group: &str, name: &str) -> bool {
    file.has_dataset(&dataset_path(group, name))
}

/// Read column `index` of `sink` from `group`, rows
/// `[row_offset, row_offset + sink.rows())`.
///
/// An absent optional field is zero-filled. An absent compulsory field is
/// an error. Values are converted from `input_units` to `internal_units`.
pub fn read_field(
    file: &dyn ContainerFile,
    group: &str,
    sink: &mut dyn ColumnSink,
    index: usize,
    row_offset: u64,
    input_units: &UnitSystem,
    internal_units: &UnitSystem,
) -> Result<(), OutputError> {
    let meta = sink.column(index).clone();
    if !field_exists(file, group, &meta.name) {
        return match meta.importance {
            Importance::Optional => {
                tracing::debug!(field = %meta.name, group, "optional field absent, zero-filled");
                sink.zero_fill(index)?;
                Ok(())
            }
            Importance::Compulsory => Err(OutputError::MissingCompulsory {
                field: meta.name,
                group: group.to_string(),
            }),
        };
    }
    let path = dataset_path(group, &meta.name);
    let mut bytes = file.read_rows(&path, row_offset, sink.rows() as u64)?;
    let factor = input_units.conversion_factor_to(internal_units, meta.units);
    scale_in_place(&meta, &mut bytes, factor)?;
    sink.scatter(index, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skewer_core::{
        CatalogView, CatalogViewMut, ColumnSource, FieldCatalog, FieldDescriptor, UnitConversion,
    };
    use skewer_store::{MemoryStore, StructuredStore};
    use std::path::Path;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Rec {
        rho: f32,
        id: u64,
    }

    fn catalog() -> FieldCatalog<Rec> {
        let mut c = FieldCatalog::new();
        c.push(FieldDescriptor::scalar_rw(
            "Density",
            UnitConversion::Density,
            "Mass densities",
            |r: &Rec| r.rho,
            |r: &mut Rec, v| r.rho = v,
        ))
        .unwrap();
        c.push(
            FieldDescriptor::scalar_rw(
                "ParticleIDs",
                UnitConversion::NoUnits,
                "Unique identifiers",
                |r: &Rec| r.id,
                |r: &mut Rec, v| r.id = v,
            )
            .optional(),
        )
        .unwrap();
        c
    }

    fn galactic() -> UnitSystem {
        UnitSystem::new(1.989e43, 3.085678e24, 3.085678e19, 1.0, 1.0).unwrap()
    }

    #[test]
    fn declare_writes_exact_attribute_set() {
        let store = MemoryStore::new();
        let mut file = store.create(Path::new("a.hdf5")).unwrap();
        file.create_group("/PartType0").unwrap();
        let cat = catalog();
        let ctx = RunContext {
            scale_factor: 0.5,
            ..RunContext::default()
        };
        let meta = cat.field(0).unwrap().meta();
        let path = declare_dataset(file.as_mut(), "/PartType0", meta, 10, 1 << 16, 0, &ctx)
            .unwrap();
        assert_eq!(path, "/PartType0/Density");
        let names = file.attribute_names(&path).unwrap();
        let expected = [
            "U_M exponent",
            "U_L exponent",
            "U_t exponent",
            "U_I exponent",
            "U_T exponent",
            "h-scale exponent",
            "a-scale exponent",
            ATTR_EXPRESSION,
            ATTR_FACTOR_CGS,
            ATTR_FACTOR_PHYSICAL,
            ATTR_DESCRIPTION,
        ];
        assert_eq!(names, expected);
        let l_exp = file.read_attribute(&path, "U_L exponent").unwrap();
        assert_eq!(l_exp.as_f64(), Some(-3.0));
        let layout = file.dataset_layout(&path).unwrap();
        assert_eq!(layout.chunk_rows(), 10);
        assert!(layout.fletcher32);
    }

    #[test]
    fn physical_factor_includes_scale_factor() {
        let store = MemoryStore::new();
        let mut file = store.create(Path::new("a.hdf5")).unwrap();
        file.create_group("/G").unwrap();
        let ctx = RunContext {
            scale_factor: 0.5,
            ..RunContext::default()
        };
        let mut meta = catalog().field(0).unwrap().meta().clone();
        meta.a_exponent = -3.0;
        let path = declare_dataset(file.as_mut(), "/G", &meta, 4, 8, 0, &ctx).unwrap();
        let physical = file.read_attribute(&path, ATTR_FACTOR_PHYSICAL).unwrap();
        let physical = physical.as_f64().unwrap();
        assert!((physical - 8.0).abs() < 1e-12);
    }

    #[test]
    fn empty_description_is_rejected() {
        let mut meta = catalog().field(0).unwrap().meta().clone();
        meta.description = "  ".into();
        match check_writable(&meta, &RunContext::default()) {
            Err(ConfigError::EmptyDescription { name }) => assert_eq!(name, "Density"),
            other => panic!("expected EmptyDescription, got {other:?}"),
        }
    }

    #[test]
    fn unit_round_trip_with_conversion() {
        let store = MemoryStore::new();
        let cat = catalog();
        let records: Vec<Rec> = (0..7)
            .map(|i| Rec {
                rho: 1.0 + i as f32 * 0.25,
                id: i,
            })
            .collect();
        let ctx = RunContext {
            internal_units: galactic(),
            output_units: UnitSystem::cgs(),
            ..RunContext::default()
        };
        let mut file = store.create(Path::new("u.hdf5")).unwrap();
        file.create_group("/G").unwrap();
        let view = CatalogView::new(&cat, &records);
        for i in 0..view.column_count() {
            let meta = view.column(i);
            let path = declare_dataset(file.as_mut(), "/G", meta, 7, 4, 0, &ctx).unwrap();
            write_subrange(file.as_mut(), &path, meta, view.gather(i), 0, &ctx).unwrap();
        }
        // Stored values are in CGS.
        let raw = file.read_rows("/G/Density", 0, 1).unwrap();
        let stored = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        assert!((stored / records[0].rho - 6.76e-31).abs() / 6.76e-31 < 1e-2);

        let mut back = vec![Rec::default(); 7];
        let mut sink = CatalogViewMut::new(&cat, &mut back);
        for i in 0..2 {
            read_field(file.as_ref(), "/G", &mut sink, i, 0, &UnitSystem::cgs(), &galactic())
                .unwrap();
        }
        for (a, b) in records.iter().zip(&back) {
            assert!((a.rho - b.rho).abs() <= 1e-5 * a.rho);
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn identical_units_are_byte_identical() {
        let store = MemoryStore::new();
        let cat = catalog();
        let records = vec![Rec { rho: 0.1, id: 3 }, Rec { rho: 1e-7, id: 4 }];
        let ctx = RunContext::default();
        let mut file = store.create(Path::new("b.hdf5")).unwrap();
        file.create_group("/G").unwrap();
        let view = CatalogView::new(&cat, &records);
        let meta = view.column(0);
        let path = declare_dataset(file.as_mut(), "/G", meta, 2, 8, 4, &ctx).unwrap();
        write_subrange(file.as_mut(), &path, meta, view.gather(0), 0, &ctx).unwrap();
        assert_eq!(file.read_rows(&path, 0, 2).unwrap(), view.gather(0));
    }

    #[test]
    fn absent_optional_zero_fills_and_compulsory_fails() {
        let store = MemoryStore::new();
        let mut file = store.create(Path::new("c.hdf5")).unwrap();
        file.create_group("/G").unwrap();
        let cat = catalog();
        let mut records = vec![Rec { rho: 5.0, id: 9 }; 3];
        let mut sink = CatalogViewMut::new(&cat, &mut records);
        let units = UnitSystem::cgs();
        read_field(file.as_ref(), "/G", &mut sink, 1, 0, &units, &units).unwrap();
        match read_field(file.as_ref(), "/G", &mut sink, 0, 0, &units, &units) {
            Err(OutputError::MissingCompulsory { field, group }) => {
                assert_eq!(field, "Density");
                assert_eq!(group, "/G");
            }
            other => panic!("expected MissingCompulsory, got {other:?}"),
        }
        assert!(records.iter().all(|r| r.id == 0 && r.rho == 5.0));
    }
}
