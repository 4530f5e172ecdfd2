//! By-reference byte strings: `4 + n` bytes, a little-endian `u32` length
//! followed by the raw bytes (spec.md §4.3).

use crate::errors::ValueError;
use std::cmp::Ordering;

const LEN_PREFIX_SIZE: usize = 4;

/// Total allocation size required to store `payload`.
pub fn encoded_len(payload: &[u8]) -> usize {
    LEN_PREFIX_SIZE + payload.len()
}

/// Writes `{len, payload}` into `target`, which must be exactly
/// [`encoded_len`] bytes long.
pub fn encode_into(target: &mut [u8], payload: &[u8]) -> Result<(), ValueError> {
    let expected = encoded_len(payload);
    if target.len() != expected {
        return Err(ValueError::SizeMismatch {
            expected,
            actual: target.len(),
        });
    }
    target[0..LEN_PREFIX_SIZE].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    target[LEN_PREFIX_SIZE..].copy_from_slice(payload);
    Ok(())
}

/// Read-only view over an allocated byte string.
#[derive(Debug)]
pub struct ByteStringRef<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteStringRef<'a> {
    /// Wraps `bytes`, which must start at the value's allocation and be at
    /// least `4 + len` long.
    pub fn new(bytes: &'a [u8]) -> Result<Self, ValueError> {
        if bytes.len() < LEN_PREFIX_SIZE {
            return Err(ValueError::SizeMismatch {
                expected: LEN_PREFIX_SIZE,
                actual: bytes.len(),
            });
        }
        let len = u32::from_le_bytes(bytes[0..LEN_PREFIX_SIZE].try_into().unwrap()) as usize;
        if bytes.len() < LEN_PREFIX_SIZE + len {
            return Err(ValueError::SizeMismatch {
                expected: LEN_PREFIX_SIZE + len,
                actual: bytes.len(),
            });
        }
        Ok(ByteStringRef { bytes })
    }

    pub fn len(&self) -> usize {
        u32::from_le_bytes(self.bytes[0..LEN_PREFIX_SIZE].try_into().unwrap()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[LEN_PREFIX_SIZE..LEN_PREFIX_SIZE + self.len()]
    }

    /// Lexicographic compare by byte contents with length tiebreak — the
    /// same ordering `[u8]`'s own `Ord` gives us.
    pub fn compare(&self, other: &ByteStringRef<'_>) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }

    /// Compares against a plain (non-persistent) byte sequence.
    pub fn compare_plain(&self, other: &[u8]) -> Ordering {
        self.as_bytes().cmp(other)
    }
}

impl<'a> PartialEq for ByteStringRef<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<'a> Eq for ByteStringRef<'a> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_payload() {
        let payload = b"James Bond";
        let mut buf = vec![0u8; encoded_len(payload)];
        encode_into(&mut buf, payload).unwrap();
        let view = ByteStringRef::new(&buf).unwrap();
        assert_eq!(view.as_bytes(), payload);
    }

    #[test]
    fn orders_lexicographically_with_length_tiebreak() {
        let mut short = vec![0u8; encoded_len(b"ab")];
        encode_into(&mut short, b"ab").unwrap();
        let mut long = vec![0u8; encoded_len(b"abc")];
        encode_into(&mut long, b"abc").unwrap();

        let short_view = ByteStringRef::new(&short).unwrap();
        let long_view = ByteStringRef::new(&long).unwrap();
        assert_eq!(short_view.compare(&long_view), Ordering::Less);
    }

    #[test]
    fn rejects_truncated_buffer() {
        let mut buf = vec![0u8; encoded_len(b"hello")];
        encode_into(&mut buf, b"hello").unwrap();
        buf.truncate(buf.len() - 1);
        assert!(ByteStringRef::new(&buf).is_err());
    }
}
