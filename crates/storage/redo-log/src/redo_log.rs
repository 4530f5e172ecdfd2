//! The `RedoLog` type: a second memory-mapped file holding a sequence of
//! checksummed transactions, plus recovery scanning on reopen.

use crate::errors::RedoError;
use crate::header::{self, HeaderMut, HeaderRef};
use crate::record::RedoRecord;
use crate::transaction::{Transaction, TRANSACTION_HEADER_SIZE};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Owns the redo log's backing file and mapping.
#[derive(Debug)]
pub struct RedoLog {
    path: PathBuf,
    file: File,
    mmap: Option<MmapMut>,
    capacity: u64,
    tail: u64,
}

impl RedoLog {
    /// Opens (creating if necessary) the redo log at `path` with room for
    /// `capacity` bytes of transactions beyond the header page.
    pub fn open(path: impl AsRef<Path>, capacity: u64) -> Result<Self, RedoError> {
        let path = path.as_ref().to_path_buf();
        let exists = path.exists();
        let real_size = header::HEADER_SIZE + capacity;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| RedoError::Io {
                path: path.clone(),
                source,
            })?;

        if !exists {
            file.set_len(real_size).map_err(|source| RedoError::Io {
                path: path.clone(),
                source,
            })?;
        }

        // SAFETY: single-threaded cooperative access only; see `mapping::Mapping::open`.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| RedoError::Io {
            path: path.clone(),
            source,
        })?;

        let mut log = RedoLog {
            path: path.clone(),
            file,
            mmap: Some(mmap),
            capacity,
            tail: header::HEADER_SIZE,
        };

        if exists {
            let header = log.header_ref()?;
            if header.magic() != header::MAGIC {
                return Err(RedoError::BadMagic(header.magic()));
            }
            log.tail = header.o2_tail()?;
        } else {
            {
                let mut header = log.header_mut()?;
                header.set_magic(header::MAGIC)?;
                header.set_o2_first_trx(header::HEADER_SIZE)?;
                header.set_o2_tail(header::HEADER_SIZE)?;
            }
            log.tail = header::HEADER_SIZE;
        }

        tracing::debug!(path = %path.display(), tail = log.tail, "opened redo log");
        Ok(log)
    }

    fn mmap(&self) -> Result<&MmapMut, RedoError> {
        self.mmap.as_ref().ok_or(RedoError::Closed)
    }

    fn mmap_mut(&mut self) -> Result<&mut MmapMut, RedoError> {
        self.mmap.as_mut().ok_or(RedoError::Closed)
    }

    fn header_ref(&self) -> Result<HeaderRef<'_>, RedoError> {
        let mmap = self.mmap()?;
        Ok(HeaderRef::new(&mmap[0..header::HEADER_SIZE as usize]))
    }

    fn header_mut(&mut self) -> Result<HeaderMut<'_>, RedoError> {
        let mmap = self.mmap_mut()?;
        Ok(HeaderMut::new(&mut mmap[0..header::HEADER_SIZE as usize]))
    }

    /// Total size available to transactions (beyond the header page).
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Offset immediately past the header where transactions begin.
    pub fn first_trx_offset(&self) -> u64 {
        header::HEADER_SIZE
    }

    /// Offset immediately past the last successfully committed transaction.
    pub fn tail(&self) -> u64 {
        self.tail
    }

    /// Begins a new transaction at the current tail.
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction::new(self, self.tail)
    }

    /// Writes raw bytes at `offset` directly into the redo mapping (used
    /// only by [`Transaction::commit`]).
    pub(crate) fn write_raw(&mut self, offset: u64, bytes: &[u8]) -> Result<(), RedoError> {
        let capacity_end = header::HEADER_SIZE + self.capacity;
        if offset + bytes.len() as u64 > capacity_end {
            return Err(RedoError::RedoFull {
                requested: bytes.len() as u64,
                available: capacity_end.saturating_sub(offset),
            });
        }
        let mmap = self.mmap_mut()?;
        let start = offset as usize;
        mmap[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Advances the cached tail and persists it in the header.
    pub(crate) fn advance_tail(&mut self, new_tail: u64) -> Result<(), RedoError> {
        self.tail = new_tail;
        let mut header = self.header_mut()?;
        header.set_o2_tail(new_tail)
    }

    /// Flushes the mapping (sync if `lazy` is false, async otherwise).
    pub(crate) fn flush(&self, lazy: bool) -> Result<(), RedoError> {
        let mmap = self.mmap()?;
        let result = if lazy { mmap.flush_async() } else { mmap.flush() };
        result.map_err(|source| RedoError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Scans every transaction from [`RedoLog::first_trx_offset`] forward,
    /// verifying each one's checksum. The first transaction whose checksum
    /// does not match ends recovery; that transaction and anything after
    /// it is discarded (spec.md §4.2). `apply` is invoked, in order, with
    /// every verified record's `(target_offset, bytes)`.
    ///
    /// Returns the offset immediately past the last verified transaction —
    /// the tail the cached value should be rewound to if it had drifted
    /// past a torn write.
    pub fn recover(&self, mut apply: impl FnMut(u64, &[u8])) -> Result<u64, RedoError> {
        let mmap = self.mmap()?;
        let mut cursor = self.first_trx_offset();
        let scan_end = self.tail.min(header::HEADER_SIZE + self.capacity);

        while cursor + TRANSACTION_HEADER_SIZE as u64 <= scan_end {
            let start = cursor as usize;
            let length = u64::from_le_bytes(mmap[start..start + 8].try_into().unwrap()) as usize;
            let checksum: [u8; 16] = mmap[start + 8..start + 24].try_into().unwrap();

            let payload_start = start + TRANSACTION_HEADER_SIZE;
            let payload_end = payload_start + length;
            if payload_end as u64 > scan_end {
                break;
            }
            let payload = &mmap[payload_start..payload_end];

            use md5::{Digest, Md5};
            let computed: [u8; 16] = Md5::digest(payload).into();
            if computed != checksum {
                tracing::warn!(offset = cursor, "redo transaction checksum mismatch, stopping recovery");
                break;
            }

            let mut record_cursor = 0usize;
            while record_cursor < payload.len() {
                let Some((record, consumed)) = RedoRecord::decode(&payload[record_cursor..]) else {
                    break;
                };
                apply(record.target_offset, &record.bytes);
                record_cursor += consumed;
            }

            cursor = payload_end as u64;
        }

        tracing::debug!(recovered_tail = cursor, "redo log recovery complete");
        Ok(cursor)
    }

    /// Unmaps and closes the redo log file.
    pub fn close(&mut self) -> Result<(), RedoError> {
        self.mmap.take().ok_or(RedoError::Closed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_and_recovers_a_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redo.log");
        let mut log = RedoLog::open(&path, 4096).unwrap();

        {
            let mut trx = log.begin();
            trx.save(100, b"hello").unwrap();
            trx.save(200, b"world").unwrap();
            trx.commit(false).unwrap();
        }

        let mut applied = Vec::new();
        let recovered_tail = log
            .recover(|offset, bytes| applied.push((offset, bytes.to_vec())))
            .unwrap();
        assert_eq!(recovered_tail, log.tail());
        assert_eq!(
            applied,
            vec![(100, b"hello".to_vec()), (200, b"world".to_vec())]
        );
    }

    #[test]
    fn save_past_capacity_fails_redo_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redo.log");
        let mut log = RedoLog::open(&path, 32).unwrap();
        let mut trx = log.begin();
        assert!(matches!(
            trx.save(0, &vec![0u8; 64]),
            Err(RedoError::RedoFull { .. })
        ));
    }

    #[test]
    fn torn_transaction_is_not_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redo.log");
        let mut log = RedoLog::open(&path, 4096).unwrap();

        {
            let mut trx = log.begin();
            trx.save(1, b"good").unwrap();
            trx.commit(false).unwrap();
        }

        // Corrupt the second transaction's checksum region by hand to simulate a torn write.
        let tail = log.tail();
        {
            let mut trx = log.begin();
            trx.save(2, b"torn").unwrap();
            trx.commit(false).unwrap();
        }
        log.write_raw(tail + 8, &[0xFFu8; 16]).unwrap();

        let mut applied = Vec::new();
        let recovered_tail = log
            .recover(|offset, bytes| applied.push((offset, bytes.to_vec())))
            .unwrap();
        assert_eq!(applied, vec![(1, b"good".to_vec())]);
        assert_eq!(recovered_tail, tail);
    }
}
