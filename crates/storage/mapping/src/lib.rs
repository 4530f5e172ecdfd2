//! Owns the primary memory-mapped file: the dual header slots, the
//! bump allocator advancing `free_offset`, and the open/flush/close
//! lifecycle.
//!
//! This is component A of the engine. It knows nothing about the value
//! or container layer above it — it only publishes raw byte ranges at
//! offsets, and enforces that `free_offset` is monotonic and bounded by
//! the real file size.

#![allow(unused)] // Silence compiler warnings about unused code until they are wired up by storage-api.

/// The unit of addressing for everything stored in the mapped file.
pub mod offset;

/// Errors produced by the mapping layer.
pub mod errors;

/// Dual-slot file header codec.
pub mod header;

/// The `Mapping` type: open/allocate/flush/close.
pub mod mapping;

pub use crate::errors::MappingError;
pub use crate::mapping::{FlushMode, Mapping, OpenedMapping};
pub use crate::offset::{NULL, Offset};

/// Page size used for the header region. Spec.md §6 calls out 4096 as typical; kept as a single constant rather than a runtime parameter, matching the teacher's `PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Size, in bytes, of a single header slot. One page, per spec.md §6.
pub const HEADER_SLOT_SIZE: u64 = PAGE_SIZE as u64;

/// Two header slots sit at the start of the file before the allocation region begins.
pub const HEADER_REGION_SIZE: u64 = 2 * HEADER_SLOT_SIZE;
