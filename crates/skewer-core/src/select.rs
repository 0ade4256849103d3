//! Output selection policies.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::params::Parameters;

/// Decides, per field name, whether a dataset is written at all.
pub trait OutputSelection {
    /// Whether the field called `name` should be written.
    fn is_field_enabled(&self, name: &str) -> bool;
}

/// Enables every field.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllFields;

impl OutputSelection for AllFields {
    fn is_field_enabled(&self, _name: &str) -> bool {
        true
    }
}

impl<F: Fn(&str) -> bool> OutputSelection for F {
    fn is_field_enabled(&self, name: &str) -> bool {
        self(name)
    }
}

/// Selection read from a parameter section.
///
/// A key `"<section>:<name>"` with value 0 disables field `name`; any
/// other integer enables it, and absent fields default to enabled.
#[derive(Clone, Debug, Default)]
pub struct ParameterSelection {
    disabled: HashSet<String>,
}

impl ParameterSelection {
    /// Section used for sightline outputs.
    pub const LINE_OF_SIGHT: &'static str = "SelectOutputLOS";
    /// Section used for snapshot outputs.
    pub const SNAPSHOT: &'static str = "SelectOutput";

    /// Read every entry of `section`, rejecting non-integer values.
    pub fn new(params: &Parameters, section: &str) -> Result<Self, ConfigError> {
        let mut disabled = HashSet::new();
        for (name, raw) in params.section(section) {
            let flag: i64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidParameter {
                    key: format!("{section}:{name}"),
                    value: raw.to_string(),
                    reason: "expected an integer flag".into(),
                })?;
            if flag == 0 {
                disabled.insert(name.to_string());
            }
        }
        Ok(Self { disabled })
    }
}

impl OutputSelection for ParameterSelection {
    fn is_field_enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_default_to_enabled() {
        let sel = ParameterSelection::new(&Parameters::new(), ParameterSelection::LINE_OF_SIGHT)
            .unwrap();
        assert!(sel.is_field_enabled("Coordinates"));
    }

    #[test]
    fn zero_disables_only_that_section() {
        let p = Parameters::new()
            .with("SelectOutputLOS:Masses", 0)
            .with("SelectOutputLOS:Velocities", 1)
            .with("SelectOutput:Densities", 0);
        let sel = ParameterSelection::new(&p, ParameterSelection::LINE_OF_SIGHT).unwrap();
        assert!(!sel.is_field_enabled("Masses"));
        assert!(sel.is_field_enabled("Velocities"));
        assert!(sel.is_field_enabled("Densities"));
    }

    #[test]
    fn non_integer_flag_is_rejected() {
        let p = Parameters::new().with("SelectOutputLOS:Masses", "yes");
        match ParameterSelection::new(&p, ParameterSelection::LINE_OF_SIGHT) {
            Err(ConfigError::InvalidParameter { key, .. }) => {
                assert_eq!(key, "SelectOutputLOS:Masses")
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }
}
