//! In-place unit conversion of little-endian column buffers.

use skewer_core::{ConfigError, Element, ElementType, FieldMeta};

/// Multiply every value in `bytes` by `factor`.
///
/// A factor of exactly 1 leaves the buffer untouched. Integer columns
/// cannot be scaled; asking for it is a configuration fault.
pub fn scale_in_place(meta: &FieldMeta, bytes: &mut [u8], factor: f64) -> Result<(), ConfigError> {
    if factor == 1.0 {
        return Ok(());
    }
    match meta.element {
        ElementType::F32 => {
            for chunk in bytes.chunks_exact_mut(4) {
                let v = f32::take(chunk);
                ((f64::from(v) * factor) as f32).put(chunk);
            }
            Ok(())
        }
        ElementType::F64 => {
            for chunk in bytes.chunks_exact_mut(8) {
                let v = f64::take(chunk);
                (v * factor).put(chunk);
            }
            Ok(())
        }
        _ => Err(ConfigError::IntegerConversion {
            name: meta.name.clone(),
            factor,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skewer_core::{Importance, UnitConversion};

    fn meta(element: ElementType) -> FieldMeta {
        FieldMeta {
            name: "x".into(),
            element,
            dim: 1,
            units: UnitConversion::Length,
            a_exponent: 0.0,
            importance: Importance::Compulsory,
            description: "x".into(),
        }
    }

    #[test]
    fn unit_factor_is_byte_identical_even_for_integers() {
        let mut bytes = 7u64.to_le_bytes().to_vec();
        scale_in_place(&meta(ElementType::U64), &mut bytes, 1.0).unwrap();
        assert_eq!(bytes, 7u64.to_le_bytes());
    }

    #[test]
    fn floats_scale() {
        let mut bytes: Vec<u8> = [1.5f64, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        scale_in_place(&meta(ElementType::F64), &mut bytes, 2.0).unwrap();
        assert_eq!(f64::take(&bytes[8..]), -4.0);
    }

    #[test]
    fn integers_refuse_scaling() {
        let mut bytes = 1i32.to_le_bytes().to_vec();
        match scale_in_place(&meta(ElementType::I32), &mut bytes, 3.0) {
            Err(ConfigError::IntegerConversion { name, .. }) => assert_eq!(name, "x"),
            other => panic!("expected IntegerConversion, got {other:?}"),
        }
    }
}
