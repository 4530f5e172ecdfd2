//! The `Mapping` type: owns the file descriptor and the memory-mapped
//! region, publishes `allocate`/`flush`/`close`, and enforces the
//! `assert_live` precondition prepended to every proxy operation
//! (spec.md §4.1, §4.8).

use crate::errors::MappingError;
use crate::header::{HeaderMut, HeaderRef, Status, MAGIC};
use crate::offset::Offset;
use crate::{HEADER_REGION_SIZE, HEADER_SLOT_SIZE, PAGE_SIZE};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Whether a flush should block until the pages are durable (`Sync`) or
/// merely be requested (`Async`). Mirrors spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    Sync,
    Async,
}

/// Which of the two fixed header slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    First,
    Second,
}

impl Slot {
    fn byte_offset(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => HEADER_SLOT_SIZE as usize,
        }
    }

    fn other(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// Result of [`Mapping::open`]: the mapping itself, plus whether the file
/// was freshly created (in which case the caller, `storage-api`, still has
/// to initialize both header slots, the schema, and the root) or reopened
/// (in which case both header slots already carry valid content and the
/// caller just needs to pick the current one).
#[derive(Debug)]
pub struct OpenedMapping {
    pub mapping: Mapping,
    pub created: bool,
}

/// Owns the memory-mapped primary file.
#[derive(Debug)]
pub struct Mapping {
    path: PathBuf,
    file: File,
    mmap: Option<MmapMut>,
    real_size: u64,
    free_offset: Offset,
}

impl Mapping {
    /// Opens (or creates) the primary file at `path`.
    ///
    /// If `path` exists, its current size is mapped and `requested_size` is
    /// only consulted to forbid an upward resize (spec.md §4.1: "Resizing an
    /// existing smaller file upward is forbidden"). A `requested_size` of
    /// `0` always means "use whatever is there" and is the only value
    /// allowed on reopen.
    ///
    /// If `path` does not exist, it is created and extended to
    /// `ceil(requested_size / page) * page + 2 * header_page`, then mapped
    /// shared read-write. `requested_size` must be nonzero in this case.
    pub fn open(path: impl AsRef<Path>, requested_size: u64) -> Result<OpenedMapping, MappingError> {
        let path = path.as_ref().to_path_buf();
        let exists = path.exists();

        if exists {
            Self::reopen(path, requested_size)
        } else {
            Self::create(path, requested_size)
        }
    }

    fn create(path: PathBuf, requested_size: u64) -> Result<OpenedMapping, MappingError> {
        if requested_size == 0 {
            return Err(MappingError::InvalidParameter(
                "requested_size must be nonzero when creating a new file".into(),
            ));
        }

        let page = PAGE_SIZE as u64;
        let rounded = requested_size.div_ceil(page) * page;
        let real_size = rounded + HEADER_REGION_SIZE;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| MappingError::Io {
                path: path.clone(),
                source,
            })?;
        file.set_len(real_size).map_err(|source| MappingError::Io {
            path: path.clone(),
            source,
        })?;

        // SAFETY: `file` was just created by us and is not shared with another
        // process; the engine's single-threaded cooperative model (spec.md §5)
        // guarantees no concurrent mutation of the mapped region from elsewhere
        // in this process either.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| MappingError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), real_size, "created primary mapping");

        Ok(OpenedMapping {
            mapping: Mapping {
                path,
                file,
                mmap: Some(mmap),
                real_size,
                free_offset: HEADER_REGION_SIZE,
            },
            created: true,
        })
    }

    fn reopen(path: PathBuf, requested_size: u64) -> Result<OpenedMapping, MappingError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| MappingError::Io {
                path: path.clone(),
                source,
            })?;

        let current_size = file
            .metadata()
            .map_err(|source| MappingError::Io {
                path: path.clone(),
                source,
            })?
            .len();

        if requested_size != 0 && requested_size > current_size {
            return Err(MappingError::ResizeForbidden {
                current: current_size,
                requested: requested_size,
            });
        }

        // SAFETY: see `create`; single-threaded cooperative access only.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| MappingError::Io {
            path: path.clone(),
            source,
        })?;

        let mut mapping = Mapping {
            path: path.clone(),
            file,
            mmap: Some(mmap),
            real_size: current_size,
            free_offset: HEADER_REGION_SIZE,
        };

        let (slot, header) = mapping.current_header_slot()?;
        mapping.free_offset = header.free_offset()?;
        drop(header);
        tracing::debug!(path = %path.display(), ?slot, free_offset = mapping.free_offset, "reopened primary mapping");

        Ok(OpenedMapping {
            mapping,
            created: false,
        })
    }

    fn mmap(&self) -> Result<&MmapMut, MappingError> {
        self.mmap.as_ref().ok_or(MappingError::Closed)
    }

    fn mmap_mut(&mut self) -> Result<&mut MmapMut, MappingError> {
        self.mmap.as_mut().ok_or(MappingError::Closed)
    }

    /// Fails with [`MappingError::Closed`] if called after [`Mapping::close`].
    /// Prepended to every proxy operation, per spec.md §4.1.
    pub fn assert_live(&self) -> Result<(), MappingError> {
        if self.mmap.is_some() {
            Ok(())
        } else {
            Err(MappingError::Closed)
        }
    }

    /// The current bump-allocator high-water mark.
    pub fn free_offset(&self) -> Offset {
        self.free_offset
    }

    /// The real, page-aligned size of the mapped file.
    pub fn real_size(&self) -> u64 {
        self.real_size
    }

    /// Returns the pre-increment `free_offset` and advances it by `n` bytes.
    /// Fails with [`MappingError::Full`] if the allocator would run past
    /// the end of the file. Bytes returned are zero, as guaranteed by the
    /// OS for a freshly extended sparse file (spec.md §4.1).
    pub fn allocate(&mut self, n: u64) -> Result<Offset, MappingError> {
        self.assert_live()?;
        let new_free = self
            .free_offset
            .checked_add(n)
            .ok_or(MappingError::Full {
                requested: n,
                available: self.real_size.saturating_sub(self.free_offset),
            })?;
        if new_free > self.real_size {
            return Err(MappingError::Full {
                requested: n,
                available: self.real_size - self.free_offset,
            });
        }
        let start = self.free_offset;
        self.free_offset = new_free;
        tracing::trace!(start, n, new_free, "allocated region");
        Ok(start)
    }

    /// Reads `len` bytes at `offset`.
    pub fn read_at(&self, offset: Offset, len: usize) -> Result<&[u8], MappingError> {
        let mmap = self.mmap()?;
        let start = offset as usize;
        mmap.get(start..start + len)
            .ok_or(MappingError::Full {
                requested: len as u64,
                available: self.real_size.saturating_sub(offset),
            })
    }

    /// Mutable view of `len` bytes at `offset`, for in-place value mutation
    /// (scalar increment/add/bit ops) that doesn't go through a whole-slice
    /// `write_at` copy.
    pub fn read_at_mut(&mut self, offset: Offset, len: usize) -> Result<&mut [u8], MappingError> {
        let real_size = self.real_size;
        let mmap = self.mmap_mut()?;
        let start = offset as usize;
        mmap.get_mut(start..start + len).ok_or(MappingError::Full {
            requested: len as u64,
            available: real_size.saturating_sub(offset),
        })
    }

    /// Writes `bytes` at `offset`.
    pub fn write_at(&mut self, offset: Offset, bytes: &[u8]) -> Result<(), MappingError> {
        let real_size = self.real_size;
        let mmap = self.mmap_mut()?;
        let start = offset as usize;
        let dst = mmap
            .get_mut(start..start + bytes.len())
            .ok_or(MappingError::Full {
                requested: bytes.len() as u64,
                available: real_size.saturating_sub(offset),
            })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    /// Synchronous or asynchronous page sync.
    pub fn flush(&self, mode: FlushMode) -> Result<(), MappingError> {
        let mmap = self.mmap()?;
        let result = match mode {
            FlushMode::Sync => mmap.flush(),
            FlushMode::Async => mmap.flush_async(),
        };
        result.map_err(|source| MappingError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Unmaps and closes the file descriptor. Idempotent only insofar as a
    /// second call fails with [`MappingError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<(), MappingError> {
        if self.mmap.take().is_none() {
            return Err(MappingError::AlreadyClosed);
        }
        tracing::debug!(path = %self.path.display(), "closed primary mapping");
        Ok(())
    }

    /// Reads the header slot with the given index (0 or 1).
    pub(crate) fn header_slot_ref(&self, index: u8) -> Result<HeaderRef<'_>, MappingError> {
        let slot = if index == 0 { Slot::First } else { Slot::Second };
        let bytes = self.read_at(slot.byte_offset() as u64, PAGE_SIZE)?;
        Ok(HeaderRef::new(bytes))
    }

    /// Mutable access to the header slot with the given index (0 or 1).
    pub(crate) fn header_slot_mut(&mut self, index: u8) -> Result<HeaderMut<'_>, MappingError> {
        let slot = if index == 0 { Slot::First } else { Slot::Second };
        let start = slot.byte_offset();
        let mmap = self.mmap_mut()?;
        let bytes = mmap
            .get_mut(start..start + PAGE_SIZE)
            .ok_or(MappingError::Closed)?;
        Ok(HeaderMut::new(bytes))
    }

    /// Scans both header slots and returns the index (0 or 1) of the
    /// current one: the clean slot with the highest revision (spec.md
    /// §3.2 invariant 1). Fails with [`MappingError::NoCleanHeader`] if
    /// neither slot is clean, or [`MappingError::BadMagic`] if a slot with
    /// valid status carries an unexpected magic.
    fn current_header_slot(&self) -> Result<(u8, HeaderRef<'_>), MappingError> {
        let mut best: Option<(u8, u64)> = None;
        for index in 0..2u8 {
            let header = self.header_slot_ref(index)?;
            let magic = header.magic();
            if magic != MAGIC {
                continue;
            }
            if header.status()? != Status::Clean {
                continue;
            }
            let revision = header.revision()?;
            if best.is_none_or(|(_, best_rev)| revision > best_rev) {
                best = Some((index, revision));
            }
        }
        match best {
            Some((index, _)) => Ok((index, self.header_slot_ref(index)?)),
            None => Err(MappingError::NoCleanHeader),
        }
    }

    /// Public variant of [`Mapping::current_header_slot`] for callers outside this crate.
    pub fn current_header(&self) -> Result<HeaderRef<'_>, MappingError> {
        self.current_header_slot().map(|(_, header)| header)
    }

    /// Index of the slot currently holding the clean header.
    pub fn current_header_index(&self) -> Result<u8, MappingError> {
        self.current_header_slot().map(|(index, _)| index)
    }

    /// Durably publishes a new header revision (spec.md §4.8's
    /// `flush → set status C → flush` sequence): writes the shadow slot as
    /// `Dirty` with the current `free_offset` and the given root/registry
    /// offsets, flushes, flips it to `Clean`, then flushes again. On the
    /// very first commit of a freshly created file (neither slot clean
    /// yet), targets slot 0 at revision 0.
    pub fn commit(&mut self, o2_string_registry: Offset, o2_pickled_type_list: Offset, o2_root: Offset) -> Result<(), MappingError> {
        let (target_index, next_revision) = match self.current_header_slot() {
            Ok((index, header)) => (1 - index, header.revision()? + 1),
            Err(MappingError::NoCleanHeader) => (0u8, 0u64),
            Err(other) => return Err(other),
        };
        let free_offset = self.free_offset;

        {
            let mut header = self.header_slot_mut(target_index)?;
            header.set_magic(MAGIC)?;
            header.set_status(Status::Dirty);
            header.set_revision(next_revision)?;
            header.set_free_offset(free_offset)?;
            header.set_o2_string_registry(o2_string_registry)?;
            header.set_o2_pickled_type_list(o2_pickled_type_list)?;
            header.set_o2_root(o2_root)?;
        }
        self.flush(FlushMode::Sync)?;

        {
            let mut header = self.header_slot_mut(target_index)?;
            header.set_status(Status::Clean);
        }
        self.flush(FlushMode::Sync)?;

        tracing::debug!(target_index, next_revision, free_offset, o2_root, "committed header revision");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_allocate_and_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let OpenedMapping { mut mapping, created } = Mapping::open(&path, PAGE_SIZE as u64).unwrap();
        assert!(created);
        assert_eq!(mapping.free_offset(), HEADER_REGION_SIZE);

        let a = mapping.allocate(16).unwrap();
        let b = mapping.allocate(16).unwrap();
        assert_eq!(a, HEADER_REGION_SIZE);
        assert_eq!(b, HEADER_REGION_SIZE + 16);

        mapping.write_at(a, b"0123456789abcdef").unwrap();
        assert_eq!(mapping.read_at(a, 16).unwrap(), b"0123456789abcdef");

        mapping.close().unwrap();
        assert!(matches!(mapping.close(), Err(MappingError::AlreadyClosed)));
        assert!(mapping.assert_live().is_err());
    }

    #[test]
    fn allocate_past_end_fails_full() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let OpenedMapping { mut mapping, .. } = Mapping::open(&path, PAGE_SIZE as u64).unwrap();
        let available = mapping.real_size() - mapping.free_offset();
        assert!(matches!(
            mapping.allocate(available + 1),
            Err(MappingError::Full { .. })
        ));
    }

    #[test]
    fn resize_existing_file_upward_is_forbidden() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let OpenedMapping { mapping, .. } = Mapping::open(&path, PAGE_SIZE as u64).unwrap();
        let current = mapping.real_size();
        drop(mapping);

        let result = Mapping::open(&path, current * 4);
        assert!(matches!(result, Err(MappingError::ResizeForbidden { .. })));
    }
}
