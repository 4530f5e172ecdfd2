//! A single in-flight transaction: a sequence of [`RedoRecord`]s accumulated
//! in memory, written to the log and checksummed atomically on commit
//! (spec.md §4.2, §6).

use crate::errors::RedoError;
use crate::record::RedoRecord;
use crate::redo_log::RedoLog;
use md5::{Digest, Md5};

/// Framing for a committed transaction: `{length: u64, checksum: [u8; 16]}`.
pub const TRANSACTION_HEADER_SIZE: usize = 24;

/// A transaction being assembled against a [`RedoLog`]. Records are buffered
/// in memory and only reach the mapping on [`Transaction::commit`], so a
/// transaction abandoned mid-flight (dropped without committing) leaves the
/// log untouched.
#[derive(Debug)]
pub struct Transaction<'a> {
    log: &'a mut RedoLog,
    start_offset: u64,
    payload: Vec<u8>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(log: &'a mut RedoLog, start_offset: u64) -> Self {
        Transaction {
            log,
            start_offset,
            payload: Vec::new(),
        }
    }

    /// Buffers one byte-range update. Fails with [`RedoError::RedoFull`] if
    /// committing the transaction so far (including this record) would not
    /// fit in the remaining log capacity.
    pub fn save(&mut self, target_offset: u64, bytes: &[u8]) -> Result<(), RedoError> {
        let record = RedoRecord::new(target_offset, bytes.to_vec());
        let prospective_len = TRANSACTION_HEADER_SIZE + self.payload.len() + record.encoded_len();
        let capacity_end = self.log.first_trx_offset() + self.log.capacity();
        if self.start_offset + prospective_len as u64 > capacity_end {
            return Err(RedoError::RedoFull {
                requested: record.encoded_len() as u64,
                available: capacity_end.saturating_sub(self.start_offset + self.payload.len() as u64),
            });
        }
        record.encode_into(&mut self.payload);
        Ok(())
    }

    /// Finalizes the transaction: computes its checksum, writes
    /// `{length, checksum, payload}` to the log at `start_offset`, advances
    /// the tail, and flushes. `lazy` selects an asynchronous flush (used for
    /// the non-durable fast path) over a synchronous one.
    pub fn commit(self, lazy: bool) -> Result<(), RedoError> {
        if self.payload.is_empty() {
            return Ok(());
        }

        let checksum: [u8; 16] = Md5::digest(&self.payload).into();
        let mut framed = Vec::with_capacity(TRANSACTION_HEADER_SIZE + self.payload.len());
        framed.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        framed.extend_from_slice(&checksum);
        framed.extend_from_slice(&self.payload);

        self.log.write_raw(self.start_offset, &framed)?;
        let new_tail = self.start_offset + framed.len() as u64;
        self.log.advance_tail(new_tail)?;
        self.log.flush(lazy)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transaction_commits_as_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redo.log");
        let mut log = RedoLog::open(&path, 4096).unwrap();
        let tail_before = log.tail();
        log.begin().commit(false).unwrap();
        assert_eq!(log.tail(), tail_before);
    }
}
