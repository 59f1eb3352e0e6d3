//! Little-endian field access for the binary containers.
//!
//! Reads past the end of a slice yield zero; callers validate lengths
//! up front where a short read would change the meaning.

#[inline]
pub(crate) fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    match bytes.get(offset..offset + 2) {
        Some(field) => u16::from_le_bytes([field[0], field[1]]),
        None => 0,
    }
}

#[inline]
pub(crate) fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    match bytes.get(offset..offset + 4) {
        Some(field) => u32::from_le_bytes([field[0], field[1], field[2], field[3]]),
        None => 0,
    }
}

#[inline]
pub(crate) fn le_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from(le_u32(bytes, offset)) | u64::from(le_u32(bytes, offset + 4)) << 32
}

/// Splits `bytes` into consecutive `u32` values, ignoring a trailing partial word.
pub(crate) fn u32_iter(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}
