//! Big-endian field extraction
//!
//! Every integer in a VHD structure is big-endian. The byte order is fixed by
//! the format, so there is no per-call switch.

use vhdburn_core::{Error, Result};

/// Interpret `buffer[start..end]` as a big-endian unsigned integer.
///
/// Fails with [`Error::Range`] when the bounds are inverted, run past the
/// buffer, or span more than eight bytes.
pub fn read_uint(buffer: &[u8], start: usize, end: usize) -> Result<u64> {
    if start > end || end > buffer.len() || end - start > 8 {
        return Err(Error::Range {
            start,
            end,
            len: buffer.len(),
        });
    }

    Ok(buffer[start..end]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// End of a `width`-byte field at `offset`, or a range error on overflow
fn field_end(buffer: &[u8], offset: usize, width: usize) -> Result<usize> {
    offset.checked_add(width).ok_or(Error::Range {
        start: offset,
        end: usize::MAX,
        len: buffer.len(),
    })
}

/// Read a 4-byte big-endian field starting at `offset`
pub fn read_u32(buffer: &[u8], offset: usize) -> Result<u32> {
    read_uint(buffer, offset, field_end(buffer, offset, 4)?).map(|v| v as u32)
}

/// Read an 8-byte big-endian field starting at `offset`
pub fn read_u64(buffer: &[u8], offset: usize) -> Result<u64> {
    read_uint(buffer, offset, field_end(buffer, offset, 8)?)
}

/// Copy a fixed-size byte field starting at `offset`
pub fn read_bytes<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = field_end(buffer, offset, N)?;
    if end > buffer.len() {
        return Err(Error::Range {
            start: offset,
            end,
            len: buffer.len(),
        });
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&buffer[offset..end]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_uint_big_endian() {
        let buf = [0x00, 0x00, 0x00, 0x02, 0x01, 0x23];
        assert_eq!(read_uint(&buf, 0, 4).unwrap(), 2);
        assert_eq!(read_uint(&buf, 4, 6).unwrap(), 0x0123);
    }

    #[test]
    fn test_read_uint_empty_range_is_zero() {
        assert_eq!(read_uint(&[0xFF], 1, 1).unwrap(), 0);
    }

    #[test]
    fn test_read_uint_rejects_bad_ranges() {
        let buf = [0u8; 16];
        assert!(matches!(read_uint(&buf, 4, 2), Err(Error::Range { .. })));
        assert!(matches!(read_uint(&buf, 12, 17), Err(Error::Range { len: 16, .. })));
        assert!(matches!(read_uint(&buf, 0, 9), Err(Error::Range { .. })));
    }

    #[test]
    fn test_read_fixed_width_helpers() {
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&0xDEADBEEFu32.to_be_bytes());
        buf[8..16].copy_from_slice(&0x0000_0000_0000_0600u64.to_be_bytes());

        assert_eq!(read_u32(&buf, 0).unwrap(), 0xDEADBEEF);
        assert_eq!(read_u64(&buf, 8).unwrap(), 1536);
        assert_eq!(read_bytes::<4>(&buf, 0).unwrap(), [0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(read_bytes::<4>(&buf, 14).is_err());
    }

    #[test]
    fn test_offsets_near_usize_max_are_range_errors() {
        let buf = [0u8; 16];
        assert!(matches!(read_u32(&buf, usize::MAX - 1), Err(Error::Range { len: 16, .. })));
        assert!(matches!(read_u64(&buf, usize::MAX - 3), Err(Error::Range { .. })));
        assert!(matches!(read_bytes::<4>(&buf, usize::MAX - 1), Err(Error::Range { .. })));
    }
}
