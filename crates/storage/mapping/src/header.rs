//! Layout and accessors for one header slot of the primary file.
//!
//! # Header Slot Layout
//!
//! Each header slot occupies one full page ([`crate::HEADER_SLOT_SIZE`]
//! bytes) at a fixed position in the file (slot 0 at offset 0, slot 1 at
//! offset [`crate::HEADER_SLOT_SIZE`]). All multi-byte integers are
//! host-endian on disk conceptually, but this implementation always writes
//! little-endian so the file layout is at least deterministic across runs
//! on the same architecture family (spec.md §6 notes portability is a
//! non-goal either way).
//!
//! | Field | Type | Offset | Description |
//! |---|---|---|---|
//! | `magic` | `[u8; 31]` | 0 | NUL-padded magic string with embedded version tag. |
//! | `status` | `u8` | 31 | `b'C'` (clean) or `b'D'` (dirty). |
//! | `revision` | `u64` | 32 | Monotonic revision number. |
//! | `last_applied_redo_file_number` | `u64` | 40 | Reserved for future multi-file redo. |
//! | `o2_last_applied_trx` | `u64` | 48 | Reserved: offset of the last redo transaction applied. |
//! | `free_offset` | `u64` | 56 | Bump-allocator high-water mark. |
//! | `o2_string_registry` | `u64` | 64 | Offset of the string registry. |
//! | `o2_pickled_type_list` | `u64` | 72 | Offset of the persisted type list. |
//! | `o2_root` | `u64` | 80 | Offset of the root value. |

use crate::errors::MappingError;
use binary_helpers::fixed_str::{read_fixed_str, write_fixed_str};
use binary_helpers::le::{read_le, write_le};
use paste::paste;

/// Size in bytes of the `magic` field.
pub const MAGIC_LEN: usize = 31;

/// Magic string (with embedded version tag) expected at the start of every header slot.
pub const MAGIC: &str = "STRATADB/v1";

/// Byte value of a clean status.
pub const STATUS_CLEAN: u8 = b'C';
/// Byte value of a dirty status.
pub const STATUS_DIRTY: u8 = b'D';

const STATUS_OFFSET: usize = MAGIC_LEN;

/// Status of a header slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Clean,
    Dirty,
}

impl From<Status> for u8 {
    fn from(s: Status) -> Self {
        match s {
            Status::Clean => STATUS_CLEAN,
            Status::Dirty => STATUS_DIRTY,
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = MappingError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            STATUS_CLEAN => Ok(Status::Clean),
            STATUS_DIRTY => Ok(Status::Dirty),
            other => Err(MappingError::InvalidParameter(format!(
                "unrecognized header status byte {other:#x}"
            ))),
        }
    }
}

/// Immutable view of one header slot's bytes.
#[derive(Debug)]
pub struct HeaderRef<'a> {
    bytes: &'a [u8],
}

/// Mutable view of one header slot's bytes.
#[derive(Debug)]
pub struct HeaderMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> HeaderRef<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        HeaderRef { bytes }
    }

    pub fn magic(&self) -> String {
        read_fixed_str(&self.bytes[0..MAGIC_LEN])
    }

    pub fn status(&self) -> Result<Status, MappingError> {
        Status::try_from(self.bytes[STATUS_OFFSET])
    }
}

impl<'a> HeaderMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        HeaderMut { bytes }
    }

    pub fn set_magic(&mut self, value: &str) -> Result<(), MappingError> {
        write_fixed_str(&mut self.bytes[0..MAGIC_LEN], value)?;
        Ok(())
    }

    pub fn set_status(&mut self, status: Status) {
        self.bytes[STATUS_OFFSET] = status.into();
    }

    pub fn as_ref(&self) -> HeaderRef<'_> {
        HeaderRef::new(self.bytes)
    }
}

/// Defines u64 header field constants and getter/setter methods, in the
/// same pattern as the teacher's `impl_header_accessors!`.
macro_rules! impl_u64_fields {
    ( $( $field_name:ident = $field_offset:expr ; )* ) => {
        paste! {
            $(
                #[doc = concat!("Byte offset of `", stringify!($field_name), "` within a header slot.")]
                pub const [<$field_name:upper _OFFSET>]: usize = $field_offset;

                impl<'a> HeaderRef<'a> {
                    #[doc = concat!("Reads `", stringify!($field_name), "`.")]
                    pub fn [<$field_name>](&self) -> Result<u64, MappingError> {
                        Ok(read_le::<u64>(self.bytes, $field_offset)?)
                    }
                }

                impl<'a> HeaderMut<'a> {
                    #[doc = concat!("Writes `", stringify!($field_name), "`.")]
                    pub fn [<set_ $field_name>](&mut self, value: u64) -> Result<(), MappingError> {
                        write_le::<u64>(self.bytes, $field_offset, value)?;
                        Ok(())
                    }
                }
            )*
        }
    };
}

impl_u64_fields! {
    revision = 32;
    last_applied_redo_file_number = 40;
    o2_last_applied_trx = 48;
    free_offset = 56;
    o2_string_registry = 64;
    o2_pickled_type_list = 72;
    o2_root = 80;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PAGE_SIZE;

    #[test]
    fn round_trips_all_fields() {
        let mut buf = vec![0u8; PAGE_SIZE];
        {
            let mut h = HeaderMut::new(&mut buf);
            h.set_magic(MAGIC).unwrap();
            h.set_status(Status::Clean);
            h.set_revision(7).unwrap();
            h.set_free_offset(4096 * 2).unwrap();
            h.set_o2_root(12345).unwrap();
        }
        let h = HeaderRef::new(&buf);
        assert_eq!(h.magic(), MAGIC);
        assert_eq!(h.status().unwrap(), Status::Clean);
        assert_eq!(h.revision().unwrap(), 7);
        assert_eq!(h.free_offset().unwrap(), 8192);
        assert_eq!(h.o2_root().unwrap(), 12345);
    }

    #[test]
    fn rejects_unknown_status_byte() {
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[STATUS_OFFSET] = b'X';
        let h = HeaderRef::new(&buf);
        assert!(h.status().is_err());
    }
}
