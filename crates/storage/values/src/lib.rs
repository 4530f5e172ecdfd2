//! Component C: value codecs. Scalar (`Int`, `Float`) by-value slots, the
//! by-reference `ByteString`, the `Field` read/write contract shared by
//! every container, and the reconstructable foreign buffer of spec.md §4.7.
//!
//! Everything here operates on plain byte slices — it knows nothing about
//! `mapping::Mapping` or allocation. The layer above (`storage-api`) pairs
//! these codecs with a live mapping to produce proxies.

pub mod byte_string;
pub mod errors;
pub mod field;
pub mod foreign_buffer;
pub mod scalar;

pub use byte_string::ByteStringRef;
pub use errors::ValueError;
pub use field::{Field, FieldView, StorageKind};
pub use foreign_buffer::ForeignBuffer;
pub use scalar::{FloatMut, FloatRef, IntMut, IntRef};
