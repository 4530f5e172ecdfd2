//! The embedded, single-process, single-threaded persistent object store
//! (spec.md §1): a typed schema and proxy API laid directly over one
//! memory-mapped file, with an optional append-only checksummed redo log
//! for crash recovery.

pub mod errors;
pub mod proxy;
pub mod storage;

pub use errors::StorageError;
pub use schema::{NoVolatileBases, Schema, SchemaError, TypeDescriptor, VolatileResolver};
pub use storage::{DictHandle, ListHandle, NodeHandle, SkipListHandle, SkipListOrder, Storage, StructureProxy};
