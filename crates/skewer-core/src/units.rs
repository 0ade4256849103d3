//! Unit systems and conversion-factor arithmetic.
//!
//! A [`UnitSystem`] stores the CGS magnitude of each of the five base
//! units. A [`UnitConversion`] tags a physical quantity with its base-unit
//! exponents, so the factor between two systems for that quantity is the
//! product of the per-base ratios raised to those exponents.

use std::fmt::Write as _;

use crate::error::ConfigError;

/// Adiabatic index used by the entropy-like conversions.
const HYDRO_GAMMA: f32 = 5.0 / 3.0;

/// The five base dimensions of a unit system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseUnit {
    /// Mass (`U_M`, grams).
    Mass,
    /// Length (`U_L`, centimetres).
    Length,
    /// Time (`U_t`, seconds).
    Time,
    /// Electric current (`U_I`, amperes).
    Current,
    /// Temperature (`U_T`, kelvin).
    Temperature,
}

impl BaseUnit {
    /// All base units in storage order.
    pub const ALL: [BaseUnit; 5] = [
        BaseUnit::Mass,
        BaseUnit::Length,
        BaseUnit::Time,
        BaseUnit::Current,
        BaseUnit::Temperature,
    ];

    /// Position of this unit in exponent and magnitude arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Symbol of the code unit, e.g. `"U_M"`.
    pub fn code_symbol(self) -> &'static str {
        match self {
            Self::Mass => "U_M",
            Self::Length => "U_L",
            Self::Time => "U_t",
            Self::Current => "U_I",
            Self::Temperature => "U_T",
        }
    }

    /// Symbol of the CGS unit, e.g. `"g"`.
    pub fn cgs_symbol(self) -> &'static str {
        match self {
            Self::Mass => "g",
            Self::Length => "cm",
            Self::Time => "s",
            Self::Current => "A",
            Self::Temperature => "K",
        }
    }

    /// Attribute name used when a unit system is written to a file.
    pub fn attribute_name(self) -> &'static str {
        match self {
            Self::Mass => "Unit mass in cgs (U_M)",
            Self::Length => "Unit length in cgs (U_L)",
            Self::Time => "Unit time in cgs (U_t)",
            Self::Current => "Unit current in cgs (U_I)",
            Self::Temperature => "Unit temperature in cgs (U_T)",
        }
    }
}

/// Physical quantity carried by a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitConversion {
    /// Dimensionless.
    NoUnits,
    /// Mass.
    Mass,
    /// Length.
    Length,
    /// Time.
    Time,
    /// Electric current.
    Current,
    /// Temperature.
    Temperature,
    /// Mass per volume.
    Density,
    /// Length per time.
    Speed,
    /// Length per time squared.
    Acceleration,
    /// Gravitational potential (energy per mass).
    Potential,
    /// Mass times acceleration.
    Force,
    /// Energy.
    Energy,
    /// Specific energy.
    EnergyPerUnitMass,
    /// Entropic function `P / rho^gamma` times mass.
    Entropy,
    /// Entropic function `P / rho^gamma`.
    EntropyPerUnitMass,
    /// Force per area.
    Pressure,
    /// Energy per time.
    Power,
    /// Inverse time.
    Frequency,
    /// Length cubed.
    Volume,
    /// Length squared.
    Area,
    /// Inverse volume.
    NumberDensity,
    /// Mass per time.
    MassRate,
    /// Current times time.
    Charge,
}

impl UnitConversion {
    /// Base-unit exponents `[M, L, t, I, T]`.
    pub fn exponents(self) -> [f32; 5] {
        let g = HYDRO_GAMMA;
        match self {
            Self::NoUnits => [0.0, 0.0, 0.0, 0.0, 0.0],
            Self::Mass => [1.0, 0.0, 0.0, 0.0, 0.0],
            Self::Length => [0.0, 1.0, 0.0, 0.0, 0.0],
            Self::Time => [0.0, 0.0, 1.0, 0.0, 0.0],
            Self::Current => [0.0, 0.0, 0.0, 1.0, 0.0],
            Self::Temperature => [0.0, 0.0, 0.0, 0.0, 1.0],
            Self::Density => [1.0, -3.0, 0.0, 0.0, 0.0],
            Self::Speed => [0.0, 1.0, -1.0, 0.0, 0.0],
            Self::Acceleration => [0.0, 1.0, -2.0, 0.0, 0.0],
            Self::Potential | Self::EnergyPerUnitMass => [0.0, 2.0, -2.0, 0.0, 0.0],
            Self::Force => [1.0, 1.0, -2.0, 0.0, 0.0],
            Self::Energy => [1.0, 2.0, -2.0, 0.0, 0.0],
            Self::Entropy => [1.0 - g, 3.0 * g - 1.0, -2.0, 0.0, 0.0],
            Self::EntropyPerUnitMass => [-g, 3.0 * g - 1.0, -2.0, 0.0, 0.0],
            Self::Pressure => [1.0, -1.0, -2.0, 0.0, 0.0],
            Self::Power => [1.0, 2.0, -3.0, 0.0, 0.0],
            Self::Frequency => [0.0, 0.0, -1.0, 0.0, 0.0],
            Self::Volume => [0.0, 3.0, 0.0, 0.0, 0.0],
            Self::Area => [0.0, 2.0, 0.0, 0.0, 0.0],
            Self::NumberDensity => [0.0, -3.0, 0.0, 0.0, 0.0],
            Self::MassRate => [1.0, 0.0, -1.0, 0.0, 0.0],
            Self::Charge => [0.0, 0.0, 1.0, 1.0, 0.0],
        }
    }
}

/// An immutable measurement basis.
///
/// Stores the CGS magnitude of each base unit. Equality is exact
/// comparison of the five magnitudes, which is what decides whether a
/// conversion pass can be skipped entirely.
///
/// # Examples
///
/// ```
/// use skewer_core::{UnitSystem, UnitConversion};
///
/// let internal = UnitSystem::new(1.989e43, 3.086e24, 3.086e19, 1.0, 1.0).unwrap();
/// let cgs = UnitSystem::cgs();
///
/// let f = internal.conversion_factor_to(&cgs, UnitConversion::Length);
/// assert_eq!(f, 3.086e24);
/// assert_eq!(internal.conversion_factor_to(&internal, UnitConversion::Density), 1.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitSystem {
    base: [f64; 5],
}

impl UnitSystem {
    /// Build a unit system from the CGS magnitude of each base unit.
    ///
    /// Returns `Err(ConfigError::InvalidUnitSystem)` if any magnitude is
    /// zero, negative, or not finite.
    pub fn new(
        mass: f64,
        length: f64,
        time: f64,
        current: f64,
        temperature: f64,
    ) -> Result<Self, ConfigError> {
        Self::from_base([mass, length, time, current, temperature])
    }

    /// Build a unit system from an `[M, L, t, I, T]` array.
    pub fn from_base(base: [f64; 5]) -> Result<Self, ConfigError> {
        for unit in BaseUnit::ALL {
            let v = base[unit.index()];
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::InvalidUnitSystem {
                    reason: format!("{} must be finite and positive, got {v}", unit.code_symbol()),
                });
            }
        }
        Ok(Self { base })
    }

    /// The CGS system itself (all magnitudes 1).
    pub fn cgs() -> Self {
        Self { base: [1.0; 5] }
    }

    /// CGS magnitude of one base unit.
    pub fn get(&self, unit: BaseUnit) -> f64 {
        self.base[unit.index()]
    }

    /// All five magnitudes in `[M, L, t, I, T]` order.
    pub fn base(&self) -> [f64; 5] {
        self.base
    }

    /// Factor turning a value of `unit` in this system into CGS.
    pub fn cgs_conversion_factor(&self, unit: UnitConversion) -> f64 {
        let exps = unit.exponents();
        BaseUnit::ALL
            .iter()
            .map(|b| self.base[b.index()].powf(exps[b.index()] as f64))
            .product()
    }

    /// Factor turning a value of `unit` in this system into `other`.
    ///
    /// Exactly `1.0` when both systems are equal, so callers can skip
    /// the conversion pass with an exact comparison.
    pub fn conversion_factor_to(&self, other: &UnitSystem, unit: UnitConversion) -> f64 {
        if self == other {
            return 1.0;
        }
        let exps = unit.exponents();
        BaseUnit::ALL
            .iter()
            .map(|b| {
                let ratio = self.base[b.index()] / other.base[b.index()];
                ratio.powf(exps[b.index()] as f64)
            })
            .product()
    }

    /// Human-readable expression of `unit` in this system and in CGS.
    ///
    /// The expression lists the cosmological `a` factor, the code units
    /// with their powers, and then the CGS value in brackets, e.g.
    /// `"a^-3 U_M U_L^-3 [ 6.770000e-23 g cm^-3 ]"`.
    pub fn cgs_conversion_string(&self, unit: UnitConversion, a_exponent: f32) -> String {
        let exps = unit.exponents();
        let mut out = String::new();
        if a_exponent != 0.0 {
            let _ = write!(out, "{} ", power_term("a", a_exponent));
        }
        let mut dimensionless = true;
        for b in BaseUnit::ALL {
            let e = exps[b.index()];
            if e != 0.0 {
                dimensionless = false;
                let _ = write!(out, "{} ", power_term(b.code_symbol(), e));
            }
        }
        if dimensionless {
            out.push_str("[ - ]");
            return out;
        }
        let _ = write!(out, "[ {:e}", self.cgs_conversion_factor(unit));
        for b in BaseUnit::ALL {
            let e = exps[b.index()];
            if e != 0.0 {
                let _ = write!(out, " {}", power_term(b.cgs_symbol(), e));
            }
        }
        out.push_str(" ]");
        out
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self::cgs()
    }
}

fn power_term(symbol: &str, exponent: f32) -> String {
    if exponent == 1.0 {
        symbol.to_string()
    } else {
        format!("{symbol}^{exponent}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn galactic() -> UnitSystem {
        UnitSystem::new(1.98848e43, 3.08567758e24, 3.08567758e19, 1.0, 1.0).unwrap()
    }

    #[test]
    fn rejects_non_positive_magnitudes() {
        assert!(matches!(
            UnitSystem::new(0.0, 1.0, 1.0, 1.0, 1.0),
            Err(ConfigError::InvalidUnitSystem { .. })
        ));
        assert!(UnitSystem::new(1.0, -2.0, 1.0, 1.0, 1.0).is_err());
        assert!(UnitSystem::new(1.0, 1.0, f64::NAN, 1.0, 1.0).is_err());
        assert!(UnitSystem::new(1.0, 1.0, 1.0, 1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn equal_systems_give_exact_unit_factor() {
        let us = galactic();
        for unit in [
            UnitConversion::Density,
            UnitConversion::Entropy,
            UnitConversion::Speed,
        ] {
            assert_eq!(us.conversion_factor_to(&us, unit), 1.0);
        }
    }

    #[test]
    fn no_units_never_converts() {
        assert_eq!(
            galactic().conversion_factor_to(&UnitSystem::cgs(), UnitConversion::NoUnits),
            1.0
        );
    }

    #[test]
    fn density_factor_matches_hand_computation() {
        let us = galactic();
        let expected = 1.98848e43 / 3.08567758e24_f64.powi(3);
        let got = us.cgs_conversion_factor(UnitConversion::Density);
        assert!((got - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn speed_factor_between_systems() {
        let us = galactic();
        let cgs = UnitSystem::cgs();
        let f = us.conversion_factor_to(&cgs, UnitConversion::Speed);
        assert!((f - 1e5).abs() < 1e-6);
    }

    #[test]
    fn conversion_string_for_dimensionless() {
        let s = UnitSystem::cgs().cgs_conversion_string(UnitConversion::NoUnits, 0.0);
        assert_eq!(s, "[ - ]");
    }

    #[test]
    fn conversion_string_lists_code_and_cgs_units() {
        let s = UnitSystem::cgs().cgs_conversion_string(UnitConversion::Density, -3.0);
        assert!(s.starts_with("a^-3 U_M U_L^-3 [ "), "{s}");
        assert!(s.ends_with(" g cm^-3 ]"), "{s}");
    }

    proptest! {
        #[test]
        fn factor_is_inverse_of_reverse_factor(
            m in 1e-3f64..1e3, l in 1e-3f64..1e3, t in 1e-3f64..1e3,
        ) {
            let a = UnitSystem::new(m, l, t, 1.0, 1.0).unwrap();
            let b = UnitSystem::cgs();
            for unit in [UnitConversion::Energy, UnitConversion::Pressure, UnitConversion::Entropy] {
                let fwd = a.conversion_factor_to(&b, unit);
                let back = b.conversion_factor_to(&a, unit);
                prop_assert!((fwd * back - 1.0).abs() < 1e-9);
            }
        }
    }
}
