//! File-level metadata groups: header, units, parameters, code, scheme.

use chrono::Local;
use skewer_core::{BaseUnit, Parameters, UnitConversion, UnitSystem};
use skewer_store::{AttrValue, ContainerFile};

use crate::context::RunContext;
use crate::error::OutputError;

/// Group holding the output unit system.
pub const UNITS_GROUP: &str = "/Units";
/// Group holding the internal unit system.
pub const INTERNAL_UNITS_GROUP: &str = "/InternalCodeUnits";
/// Group echoing the runtime parameters.
pub const PARAMETERS_GROUP: &str = "/Parameters";
/// Group describing the producing code.
pub const CODE_GROUP: &str = "/Code";
/// Group holding hydrodynamics-scheme attributes.
pub const SCHEME_GROUP: &str = "/HydroScheme";
/// Top-level header group.
pub const HEADER_GROUP: &str = "/Header";

/// Write `units` as the five base-unit attributes of a new group.
pub fn write_unit_system(
    file: &mut dyn ContainerFile,
    group: &str,
    units: &UnitSystem,
) -> Result<(), OutputError> {
    file.create_group(group)?;
    for unit in BaseUnit::ALL {
        file.write_attribute(group, unit.attribute_name(), &AttrValue::from(units.get(unit)))?;
    }
    Ok(())
}

/// Read a unit system written by [`write_unit_system`].
///
/// Returns `None` when the group is absent.
pub fn read_unit_system(
    file: &dyn ContainerFile,
    group: &str,
) -> Result<Option<UnitSystem>, OutputError> {
    if !file.has_group(group) {
        return Ok(None);
    }
    let mut base = [0.0; 5];
    for unit in BaseUnit::ALL {
        let value = file.read_attribute(group, unit.attribute_name())?;
        base[unit.index()] = value.as_f64().ok_or_else(|| OutputError::InvalidFile {
            path: group.to_string(),
            reason: format!("'{}' is not numeric", unit.attribute_name()),
        })?;
    }
    Ok(Some(UnitSystem::from_base(base)?))
}

/// Echo every parameter as a string attribute of `/Parameters`.
pub fn write_parameters(file: &mut dyn ContainerFile, params: &Parameters) -> Result<(), OutputError> {
    file.create_group(PARAMETERS_GROUP)?;
    for (key, value) in params.iter() {
        file.write_attribute(PARAMETERS_GROUP, key, &AttrValue::from(value))?;
    }
    Ok(())
}

/// Describe the producing code in `/Code`.
pub fn write_code_description(
    file: &mut dyn ContainerFile,
    ctx: &RunContext,
) -> Result<(), OutputError> {
    file.create_group(CODE_GROUP)?;
    file.write_attribute(CODE_GROUP, "Code", &AttrValue::from(ctx.code_name.as_str()))?;
    file.write_attribute(
        CODE_GROUP,
        "Code Version",
        &AttrValue::from(env!("CARGO_PKG_VERSION")),
    )?;
    file.write_attribute(CODE_GROUP, "Run Name", &AttrValue::from(ctx.run_name.as_str()))?;
    Ok(())
}

/// Copy the collaborator-supplied scheme attributes into `/HydroScheme`.
pub fn write_scheme(file: &mut dyn ContainerFile, ctx: &RunContext) -> Result<(), OutputError> {
    file.create_group(SCHEME_GROUP)?;
    for (name, value) in &ctx.scheme {
        file.write_attribute(SCHEME_GROUP, name, value)?;
    }
    Ok(())
}

/// Write the unit, parameter, code and scheme groups shared by every file.
pub fn write_metadata_groups(
    file: &mut dyn ContainerFile,
    ctx: &RunContext,
) -> Result<(), OutputError> {
    write_code_description(file, ctx)?;
    write_scheme(file, ctx)?;
    write_parameters(file, &ctx.params)?;
    write_unit_system(file, UNITS_GROUP, &ctx.output_units)?;
    write_unit_system(file, INTERNAL_UNITS_GROUP, &ctx.internal_units)?;
    Ok(())
}

/// Creation stamp in local time, e.g. `14:03:11 2024-05-02 +02:00`.
pub fn snapshot_date() -> String {
    Local::now().format("%T %F %Z").to_string()
}

/// Create `/Header` with the run description common to all output files.
///
/// `BoxSize` and `Time` are converted to output units.
pub fn write_run_header(file: &mut dyn ContainerFile, ctx: &RunContext) -> Result<(), OutputError> {
    let length = ctx
        .internal_units
        .conversion_factor_to(&ctx.output_units, UnitConversion::Length);
    let time = ctx
        .internal_units
        .conversion_factor_to(&ctx.output_units, UnitConversion::Time);
    let box_size = ctx.box_size.map(|l| l * length);

    file.create_group(HEADER_GROUP)?;
    let h = HEADER_GROUP;
    file.write_attribute(h, "BoxSize", &AttrValue::from(box_size))?;
    file.write_attribute(h, "Time", &AttrValue::from(ctx.time * time))?;
    file.write_attribute(h, "Dimension", &AttrValue::from(ctx.dimension))?;
    file.write_attribute(h, "Redshift", &AttrValue::from(ctx.redshift))?;
    file.write_attribute(h, "Scale-factor", &AttrValue::from(ctx.scale_factor))?;
    file.write_attribute(h, "Code", &AttrValue::from(ctx.code_name.as_str()))?;
    file.write_attribute(h, "RunName", &AttrValue::from(ctx.run_name.as_str()))?;
    file.write_attribute(h, "Snapshot date", &AttrValue::from(snapshot_date()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skewer_store::{MemoryStore, StructuredStore};
    use std::path::Path;

    #[test]
    fn unit_system_round_trips() {
        let store = MemoryStore::new();
        let mut file = store.create(Path::new("u.hdf5")).unwrap();
        let units = UnitSystem::new(2.0e33, 3.0e21, 3.0e16, 1.0, 1.0).unwrap();
        write_unit_system(file.as_mut(), UNITS_GROUP, &units).unwrap();
        let back = read_unit_system(file.as_ref(), UNITS_GROUP).unwrap();
        assert_eq!(back, Some(units));
        assert_eq!(read_unit_system(file.as_ref(), "/Nope").unwrap(), None);
        assert!(file.has_attribute(UNITS_GROUP, "Unit length in cgs (U_L)"));
    }

    #[test]
    fn header_converts_box_and_time() {
        let store = MemoryStore::new();
        let mut file = store.create(Path::new("h.hdf5")).unwrap();
        let ctx = RunContext {
            box_size: [2.0, 3.0, 4.0],
            time: 5.0,
            internal_units: UnitSystem::new(1.0, 10.0, 100.0, 1.0, 1.0).unwrap(),
            run_name: "box".into(),
            ..RunContext::default()
        };
        write_run_header(file.as_mut(), &ctx).unwrap();
        let bs = file.read_attribute(HEADER_GROUP, "BoxSize").unwrap();
        assert_eq!(bs.to_f64_vec(), Some(vec![20.0, 30.0, 40.0]));
        let t = file.read_attribute(HEADER_GROUP, "Time").unwrap();
        assert_eq!(t.as_f64(), Some(500.0));
        let run = file.read_attribute(HEADER_GROUP, "RunName").unwrap();
        assert_eq!(run.as_str(), Some("box"));
        assert!(file.has_attribute(HEADER_GROUP, "Snapshot date"));
    }

    #[test]
    fn metadata_groups_echo_parameters_and_scheme() {
        let store = MemoryStore::new();
        let mut file = store.create(Path::new("m.hdf5")).unwrap();
        let ctx = RunContext {
            params: Parameters::new().with("LineOfSight:basename", "los"),
            scheme: vec![("Kernel function".into(), AttrValue::from("Cubic spline"))],
            ..RunContext::default()
        };
        write_metadata_groups(file.as_mut(), &ctx).unwrap();
        let p = file
            .read_attribute(PARAMETERS_GROUP, "LineOfSight:basename")
            .unwrap();
        assert_eq!(p.as_str(), Some("los"));
        let k = file.read_attribute(SCHEME_GROUP, "Kernel function").unwrap();
        assert_eq!(k.as_str(), Some("Cubic spline"));
        assert!(file.has_group(INTERNAL_UNITS_GROUP));
        assert!(file.has_group(CODE_GROUP));
    }
}
