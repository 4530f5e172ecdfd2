//! Component B: the append-only redo log.
//!
//! Records byte-range updates to the primary mapping as checksummed
//! transactions, before they are applied, so that a torn shutdown can be
//! detected on reopen and either reapplied (checksum verifies) or
//! abandoned (first mismatch ends recovery), per spec.md §4.2.
//!
//! Open-question resolution (spec.md §4.2/§9, SPEC_FULL.md §4.2): every
//! mutation of mapped primary bytes flows through [`Transaction::save`]
//! before `storage-api` applies it via `mapping::Mapping::write_at`. The
//! allocator's own zero-fill and the two header-commit flushes of §4.8 are
//! the only writes that bypass the log.

pub mod errors;
pub mod header;
pub mod record;
pub mod redo_log;
pub mod transaction;

pub use errors::RedoError;
pub use redo_log::RedoLog;
pub use transaction::Transaction;
