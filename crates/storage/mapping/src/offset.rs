//! An `Offset` names a byte position within the mapped file, measured from
//! its base. `0` is reserved for "null" (spec.md §3.1).

/// A byte position within the mapped file.
pub type Offset = u64;

/// The reserved null offset. No valid allocation ever starts at `0` because
/// the header region occupies the first [`crate::HEADER_REGION_SIZE`] bytes.
pub const NULL: Offset = 0;
