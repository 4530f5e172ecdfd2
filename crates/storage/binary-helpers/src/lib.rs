//! Low-level byte-codec helpers shared by every storage crate in the workspace.
//!
//! Nothing here knows about pages, mappings, or values — it only converts
//! between Rust scalars/strings and little-endian byte slices, with bounds
//! checking that turns out-of-range reads/writes into `Result`s instead of
//! panics.

pub mod bin_error;
pub mod conversions;
pub mod fixed_str;
pub mod le;
