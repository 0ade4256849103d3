//! Restart stream for [`LosProps`].
//!
//! The stream is a 20-byte NUL-padded label, the block length as a
//! little-endian `u64`, then one fixed-size block:
//!
//! | bytes | content |
//! |-------|---------|
//! | 16 | `i32` counts along XY, YZ, XZ, and their total |
//! | 48 | `f64` bounds `xmin xmax ymin ymax zmin zmax` |
//! | 200 | NUL-padded basename |
//!
//! All numbers are little-endian. There is no version field.

use std::io::{Read, Write};

use crate::error::RestartError;
use crate::props::LosProps;

/// Label introducing the block.
pub const RESTART_LABEL: &str = "losparams";

const LABEL_LEN: usize = 20;
const BASENAME_LEN: usize = 200;

/// Size of the block following the length prefix.
pub const BLOCK_LEN: u64 = (4 * 4 + 6 * 8 + BASENAME_LEN) as u64;

/// Append `props` to a restart stream.
///
/// Nothing is written unless every field fits the block.
pub fn write_restart(w: &mut dyn Write, props: &LosProps) -> Result<(), RestartError> {
    let name = props.basename.as_bytes();
    if name.len() >= BASENAME_LEN {
        return Err(RestartError::OutOfRange { field: "basename" });
    }
    let mut counts = [0i32; 4];
    for (slot, (field, n)) in counts.iter_mut().zip([
        ("num_along_xy", u64::from(props.num_along_xy)),
        ("num_along_yz", u64::from(props.num_along_yz)),
        ("num_along_xz", u64::from(props.num_along_xz)),
        ("num_tot", props.num_total()),
    ]) {
        *slot = i32::try_from(n).map_err(|_| RestartError::OutOfRange { field })?;
    }

    let mut label = [0u8; LABEL_LEN];
    label[..RESTART_LABEL.len()].copy_from_slice(RESTART_LABEL.as_bytes());
    w.write_all(&label)?;
    w.write_all(&BLOCK_LEN.to_le_bytes())?;
    for n in counts {
        w.write_all(&n.to_le_bytes())?;
    }
    for axis in 0..3 {
        w.write_all(&props.min[axis].to_le_bytes())?;
        w.write_all(&props.max[axis].to_le_bytes())?;
    }
    let mut basename = [0u8; BASENAME_LEN];
    basename[..name.len()].copy_from_slice(name);
    w.write_all(&basename)?;
    Ok(())
}

/// Read back what [`write_restart`] wrote.
pub fn read_restart(r: &mut dyn Read) -> Result<LosProps, RestartError> {
    let mut label = [0u8; LABEL_LEN];
    r.read_exact(&mut label)?;
    let found = trim_nul(&label);
    if found != RESTART_LABEL.as_bytes() {
        return Err(RestartError::BadLabel {
            found: String::from_utf8_lossy(found).into_owned(),
        });
    }
    let len = read_u64_le(r)?;
    if len != BLOCK_LEN {
        return Err(RestartError::BadLength {
            expected: BLOCK_LEN,
            found: len,
        });
    }

    let xy = read_count(r, "num_along_xy")?;
    let yz = read_count(r, "num_along_yz")?;
    let xz = read_count(r, "num_along_xz")?;
    let stored = read_i32_le(r)?;
    let computed = i64::from(xy) + i64::from(yz) + i64::from(xz);
    if i64::from(stored) != computed {
        return Err(RestartError::InconsistentTotal { stored, computed });
    }

    let mut min = [0.0; 3];
    let mut max = [0.0; 3];
    for axis in 0..3 {
        min[axis] = read_f64_le(r)?;
        max[axis] = read_f64_le(r)?;
    }

    let mut basename = [0u8; BASENAME_LEN];
    r.read_exact(&mut basename)?;
    let basename = std::str::from_utf8(trim_nul(&basename))
        .map_err(|_| RestartError::InvalidBasename)?
        .to_string();

    Ok(LosProps {
        num_along_xy: xy,
        num_along_yz: yz,
        num_along_xz: xz,
        min,
        max,
        basename,
    })
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn read_count(r: &mut dyn Read, field: &'static str) -> Result<u32, RestartError> {
    let n = read_i32_le(r)?;
    u32::try_from(n).map_err(|_| RestartError::OutOfRange { field })
}

fn read_i32_le(r: &mut dyn Read) -> Result<i32, RestartError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u64_le(r: &mut dyn Read) -> Result<u64, RestartError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64_le(r: &mut dyn Read) -> Result<f64, RestartError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}
