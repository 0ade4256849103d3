//! Chunk filters: byte shuffle and Fletcher-32 checksum.
//!
//! These follow the HDF5 definitions so a chunk's filtered bytes match
//! what the library would store before compression.

/// Fletcher-32 over 16-bit big-endian words, HDF5 flavour.
///
/// An odd trailing byte is treated as the high byte of a final word.
pub fn fletcher32(data: &[u8]) -> u32 {
    let mut sum1: u64 = 0;
    let mut sum2: u64 = 0;
    // 360 words per block keeps the sums from overflowing before folding.
    for block in data.chunks(720) {
        for pair in block.chunks(2) {
            let word = match *pair {
                [hi, lo] => (u64::from(hi) << 8) | u64::from(lo),
                [hi] => u64::from(hi) << 8,
                _ => 0,
            };
            sum1 += word;
            sum2 += sum1;
        }
        sum1 = (sum1 & 0xffff) + (sum1 >> 16);
        sum2 = (sum2 & 0xffff) + (sum2 >> 16);
    }
    sum1 = (sum1 & 0xffff) + (sum1 >> 16);
    sum2 = (sum2 & 0xffff) + (sum2 >> 16);
    ((sum2 as u32) << 16) | (sum1 as u32 & 0xffff)
}

/// Regroup bytes so byte `j` of every element is stored contiguously.
///
/// Trailing bytes that do not form a whole element are copied unchanged.
pub fn shuffle(data: &[u8], elem_size: usize) -> Vec<u8> {
    if elem_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / elem_size;
    let mut out = vec![0u8; data.len()];
    for i in 0..n {
        for j in 0..elem_size {
            out[j * n + i] = data[i * elem_size + j];
        }
    }
    out[n * elem_size..].copy_from_slice(&data[n * elem_size..]);
    out
}

/// Inverse of [`shuffle`].
pub fn unshuffle(data: &[u8], elem_size: usize) -> Vec<u8> {
    if elem_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / elem_size;
    let mut out = vec![0u8; data.len()];
    for i in 0..n {
        for j in 0..elem_size {
            out[i * elem_size + j] = data[j * n + i];
        }
    }
    out[n * elem_size..].copy_from_slice(&data[n * elem_size..]);
    out
}
