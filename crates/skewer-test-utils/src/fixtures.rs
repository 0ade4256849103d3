//! Fixture particle records and their field describers.
//!
//! - [`GasParticle`] is a minimal hydro record implementing
//!   [`Particle`]; [`hydro_fields`] describes its outputs.
//! - [`ChemistryData`] is a companion record; [`paired_catalog`] lifts both
//!   describers onto [`PairedGas`].
//! - [`DarkMatterParticle`] is a second kind for multi-kind snapshots.

use skewer_core::{
    ConfigError, FieldCatalog, FieldDescriber, FieldDescriptor, Paired, Particle, UnitConversion,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GasParticle {
    pub x: [f64; 3],
    pub v: [f32; 3],
    pub mass: f32,
    pub h: f32,
    pub u: f32,
    pub rho: f32,
    pub id: u64,
    pub inhibited: bool,
}

impl Particle for GasParticle {
    fn position(&self) -> [f64; 3] {
        self.x
    }

    fn smoothing_length(&self) -> f32 {
        self.h
    }

    fn is_inhibited(&self) -> bool {
        self.inhibited
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChemistryData {
    pub metal_mass_fraction: f32,
    pub element_fractions: [f32; 2],
}

pub type PairedGas = Paired<GasParticle, ChemistryData>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DarkMatterParticle {
    pub x: [f64; 3],
    pub v: [f32; 3],
    pub mass: f32,
    pub id: u64,
}

/// Describes the hydro outputs of [`GasParticle`]; every field can be read back.
pub fn hydro_fields(catalog: &mut FieldCatalog<GasParticle>) -> Result<usize, ConfigError> {
    catalog.push(FieldDescriptor::vector_rw(
        "Coordinates",
        UnitConversion::Length,
        "Co-moving positions of the particles",
        |p: &GasParticle| p.x,
        |p: &mut GasParticle, x| p.x = x,
    )
    .a_exponent(1.0))?;
    catalog.push(FieldDescriptor::vector_rw(
        "Velocities",
        UnitConversion::Speed,
        "Peculiar velocities of the particles",
        |p: &GasParticle| p.v,
        |p: &mut GasParticle, v| p.v = v,
    ))?;
    catalog.push(FieldDescriptor::scalar_rw(
        "Masses",
        UnitConversion::Mass,
        "Masses of the particles",
        |p: &GasParticle| p.mass,
        |p: &mut GasParticle, m| p.mass = m,
    ))?;
    catalog.push(FieldDescriptor::scalar_rw(
        "SmoothingLengths",
        UnitConversion::Length,
        "Co-moving smoothing lengths of the particles",
        |p: &GasParticle| p.h,
        |p: &mut GasParticle, h| p.h = h,
    )
    .a_exponent(1.0))?;
    catalog.push(FieldDescriptor::scalar_rw(
        "InternalEnergies",
        UnitConversion::EnergyPerUnitMass,
        "Thermal energies per unit mass",
        |p: &GasParticle| p.u,
        |p: &mut GasParticle, u| p.u = u,
    )
    .a_exponent(-2.0))?;
    catalog.push(
        FieldDescriptor::scalar_rw(
            "Densities",
            UnitConversion::Density,
            "Co-moving mass densities",
            |p: &GasParticle| p.rho,
            |p: &mut GasParticle, rho| p.rho = rho,
        )
        .a_exponent(-3.0)
        .optional(),
    )?;
    catalog.push(FieldDescriptor::scalar_rw(
        "ParticleIDs",
        UnitConversion::NoUnits,
        "Unique identifiers of the particles",
        |p: &GasParticle| p.id,
        |p: &mut GasParticle, id| p.id = id,
    ))?;
    Ok(7)
}

/// Describes the outputs of [`ChemistryData`].
pub fn chemistry_fields(catalog: &mut FieldCatalog<ChemistryData>) -> Result<usize, ConfigError> {
    catalog.push(
        FieldDescriptor::scalar_rw(
            "MetalMassFractions",
            UnitConversion::NoUnits,
            "Fractions of the particles' masses in metals",
            |c: &ChemistryData| c.metal_mass_fraction,
            |c: &mut ChemistryData, z| c.metal_mass_fraction = z,
        )
        .optional(),
    )?;
    catalog.push(
        FieldDescriptor::vector_rw(
            "ElementMassFractions",
            UnitConversion::NoUnits,
            "Fractions of the particles' masses in hydrogen and helium",
            |c: &ChemistryData| c.element_fractions,
            |c: &mut ChemistryData, f| c.element_fractions = f,
        )
        .optional(),
    )?;
    Ok(2)
}

/// Catalog of [`hydro_fields`].
pub fn gas_catalog() -> FieldCatalog<GasParticle> {
    assemble::<GasParticle>(&[&hydro_fields])
}

/// Hydro and chemistry fields lifted onto [`PairedGas`], hydro first.
pub fn paired_catalog() -> FieldCatalog<PairedGas> {
    let mut out = FieldCatalog::new();
    for d in gas_catalog().iter() {
        push(&mut out, d.clone().lift(PairedGas::part, PairedGas::part_mut));
    }
    for d in assemble::<ChemistryData>(&[&chemistry_fields]).iter() {
        push(&mut out, d.clone().lift(PairedGas::extra, PairedGas::extra_mut));
    }
    out
}

/// Catalog for [`DarkMatterParticle`].
pub fn dark_matter_catalog() -> FieldCatalog<DarkMatterParticle> {
    let describe = |c: &mut FieldCatalog<DarkMatterParticle>| -> Result<usize, ConfigError> {
        c.push(FieldDescriptor::vector_rw(
            "Coordinates",
            UnitConversion::Length,
            "Co-moving positions of the particles",
            |p: &DarkMatterParticle| p.x,
            |p: &mut DarkMatterParticle, x| p.x = x,
        ))?;
        c.push(FieldDescriptor::vector_rw(
            "Velocities",
            UnitConversion::Speed,
            "Peculiar velocities of the particles",
            |p: &DarkMatterParticle| p.v,
            |p: &mut DarkMatterParticle, v| p.v = v,
        ))?;
        c.push(FieldDescriptor::scalar_rw(
            "Masses",
            UnitConversion::Mass,
            "Masses of the particles",
            |p: &DarkMatterParticle| p.mass,
            |p: &mut DarkMatterParticle, m| p.mass = m,
        ))?;
        c.push(FieldDescriptor::scalar_rw(
            "ParticleIDs",
            UnitConversion::NoUnits,
            "Unique identifiers of the particles",
            |p: &DarkMatterParticle| p.id,
            |p: &mut DarkMatterParticle, id| p.id = id,
        ))?;
        Ok(4)
    };
    assemble::<DarkMatterParticle>(&[&describe])
}

fn assemble<R>(describers: &[&dyn FieldDescriber<R>]) -> FieldCatalog<R> {
    match FieldCatalog::assemble(describers) {
        Ok(c) => c,
        Err(e) => panic!("fixture catalog is invalid: {e}"),
    }
}

fn push<R>(catalog: &mut FieldCatalog<R>, d: FieldDescriptor<R>) {
    if let Err(e) = catalog.push(d) {
        panic!("fixture catalog is invalid: {e}");
    }
}
