//! Default dictionary (spec.md §4.4.4): as the hash table, except indexing
//! an absent key constructs and stores a fresh value rather than failing
//! `KeyNotFound`.

use crate::errors::ContainerError;
use crate::hash_table::HashTable;
use crate::key_codec::{KeyCodec, Slot};
use mapping::{Mapping, Offset};

/// A hash table with construct-on-miss semantics.
#[derive(Debug, Clone, Copy)]
pub struct DefaultDictionary {
    table: HashTable,
}

impl DefaultDictionary {
    pub fn create(mapping: &mut Mapping, requested: u64) -> Result<Self, ContainerError> {
        Ok(DefaultDictionary {
            table: HashTable::create(mapping, requested)?,
        })
    }

    pub fn open(table: HashTable) -> Self {
        DefaultDictionary { table }
    }

    pub fn table(&self) -> HashTable {
        self.table
    }

    /// Returns the value at `key`, constructing and storing one via
    /// `construct` if absent. `construct` may allocate fresh memory (the
    /// caller's own growth-delta logging covers that); the pre-existing
    /// entry-array bytes this writes into are returned alongside, for the
    /// same reason as [`HashTable::set`].
    pub fn index(
        &self,
        mapping: &mut Mapping,
        key_codec: &dyn KeyCodec,
        key: Slot,
        construct: impl FnOnce(&mut Mapping) -> Result<Slot, ContainerError>,
    ) -> Result<(Slot, Vec<(Offset, u64)>), ContainerError> {
        match self.table.index(mapping, key_codec, key) {
            Ok(value) => Ok((value, Vec::new())),
            Err(ContainerError::KeyNotFound) => {
                let value = construct(mapping)?;
                let touched = self.table.set(mapping, key_codec, key, value)?;
                Ok((value, touched))
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_codec::RawSlotKey;
    use mapping::{Mapping as MappingTy, OpenedMapping};

    fn open_mapping() -> (tempfile::TempDir, MappingTy) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let OpenedMapping { mapping, .. } = MappingTy::open(&path, 4096 * 2).unwrap();
        (dir, mapping)
    }

    #[test]
    fn index_on_absent_key_constructs_and_persists() {
        let (_dir, mut mapping) = open_mapping();
        let dict = DefaultDictionary::create(&mut mapping, 8).unwrap();
        let codec = RawSlotKey;
        let key = 1i64.to_le_bytes();

        let (constructed, touched) = dict.index(&mut mapping, &codec, key, |_| Ok(0i64.to_le_bytes())).unwrap();
        assert_eq!(constructed, 0i64.to_le_bytes());
        assert!(!touched.is_empty());

        let (again, again_touched) = dict
            .index(&mut mapping, &codec, key, |_| panic!("should not reconstruct"))
            .unwrap();
        assert_eq!(again, 0i64.to_le_bytes());
        assert!(again_touched.is_empty());
    }
}
