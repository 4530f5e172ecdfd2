//! # Strata
//!
//! **Strata** is an embedded, single-process, single-threaded persistent
//! object store: a typed schema and proxy API laid directly over one
//! memory-mapped file, with no serialization step on the access path.
//!
//! The engine is composed of multiple internal components organized under
//! the `/crates/storage` directory of this workspace:
//!
//! - `mapping`: the memory-mapped file, its dual-slot header, and the
//!   bump allocator.
//! - `values`: scalar, byte-string, and field codecs over mapped bytes.
//! - `containers`: hash table, linked list, skip list, default dictionary.
//! - `schema`: the reflective type registry and structure layout rules.
//! - `graph`: typed nodes and edges with per-kind incidence lists.
//! - `redo-log`: the append-only checksummed transaction journal.
//! - `storage-api`: `Storage`, the façade tying all of the above together.

pub use storage_api::*;
