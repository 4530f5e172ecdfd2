//! Fixed-size, NUL-padded ASCII string codec, used for the magic fields in
//! the primary file header and the redo log header (spec.md §6).

use crate::bin_error::BinaryError;

/// Writes `value` into `target`, NUL-padding the remainder.
///
/// # Parameters
/// - `target`: destination slice; its length is the fixed field width.
/// - `value`: ASCII bytes to write. Must fit within `target.len()`.
///
/// # Returns
/// - `Ok(())` on success.
/// - `Err(BinaryError)` if `value` is longer than `target`.
pub fn write_fixed_str(target: &mut [u8], value: &str) -> Result<(), BinaryError> {
    let bytes = value.as_bytes();
    if bytes.len() > target.len() {
        return Err(BinaryError::WriteErrorSliceSizeMismatch {
            src: bytes.len(),
            target: target.len(),
        });
    }
    target.fill(0);
    target[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Reads a NUL-padded ASCII string out of `source`, stopping at the first
/// NUL byte (or the end of the slice if there is none).
pub fn read_fixed_str(source: &[u8]) -> String {
    let end = source.iter().position(|&b| b == 0).unwrap_or(source.len());
    String::from_utf8_lossy(&source[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_string() {
        let mut buf = [0xAAu8; 16];
        write_fixed_str(&mut buf, "hello").unwrap();
        assert_eq!(&buf[5..], &[0u8; 11]);
        assert_eq!(read_fixed_str(&buf), "hello");
    }

    #[test]
    fn rejects_string_too_long() {
        let mut buf = [0u8; 4];
        assert!(write_fixed_str(&mut buf, "toolong").is_err());
    }

    #[test]
    fn reads_full_width_string_without_nul() {
        let mut buf = [0u8; 4];
        write_fixed_str(&mut buf, "abcd").unwrap();
        assert_eq!(read_fixed_str(&buf), "abcd");
    }
}
