//! Open-addressed hash table (spec.md §4.4.1). An entry array of `2^k`
//! slots, probed with the classical perturbation scheme, capped at a 0.9
//! load factor.

use crate::errors::ContainerError;
use crate::key_codec::{KeyCodec, Slot};
use mapping::{Mapping, Offset};

const HEADER_SIZE: u64 = 16; // capacity: u64, used: u64
const ENTRY_SIZE: u64 = 17; // state: u8, key: [u8; 8], value: [u8; 8]
const STATE_EMPTY: u8 = 0;
const STATE_USED: u8 = 1;

/// Smallest power of two strictly larger than `3/2 * requested`, computed
/// as `2 * capacity > 3 * requested` to avoid rounding a fractional
/// threshold.
fn capacity_for(requested: u64) -> u64 {
    let mut capacity: u64 = 1;
    while 2 * capacity <= 3 * requested {
        capacity <<= 1;
    }
    capacity
}

/// An open-addressed hash table living at a fixed offset in the mapping.
#[derive(Debug, Clone, Copy)]
pub struct HashTable {
    offset: Offset,
}

enum Probe {
    Found(u64),
    Empty(u64),
}

impl HashTable {
    /// Allocates and zero-initializes a table with room for at least
    /// `requested` entries at the 0.9 load factor cap.
    pub fn create(mapping: &mut Mapping, requested: u64) -> Result<Self, ContainerError> {
        let capacity = capacity_for(requested.max(1));
        let total_size = HEADER_SIZE + capacity * ENTRY_SIZE;
        let offset = mapping.allocate(total_size)?;
        mapping.write_at(offset, &capacity.to_le_bytes())?;
        mapping.write_at(offset + 8, &0u64.to_le_bytes())?;
        Ok(HashTable { offset })
    }

    /// Wraps a table previously created at `offset`.
    pub fn open(offset: Offset) -> Self {
        HashTable { offset }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn capacity(&self, mapping: &Mapping) -> Result<u64, ContainerError> {
        let bytes = mapping.read_at(self.offset, 8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn used(&self, mapping: &Mapping) -> Result<u64, ContainerError> {
        let bytes = mapping.read_at(self.offset + 8, 8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn set_used(&self, mapping: &mut Mapping, used: u64) -> Result<(), ContainerError> {
        mapping.write_at(self.offset + 8, &used.to_le_bytes())?;
        Ok(())
    }

    fn entry_offset(&self, index: u64) -> Offset {
        self.offset + HEADER_SIZE + index * ENTRY_SIZE
    }

    fn entry_state(&self, mapping: &Mapping, index: u64) -> Result<u8, ContainerError> {
        Ok(mapping.read_at(self.entry_offset(index), 1)?[0])
    }

    fn entry_key(&self, mapping: &Mapping, index: u64) -> Result<Slot, ContainerError> {
        let bytes = mapping.read_at(self.entry_offset(index) + 1, 8)?;
        Ok(bytes.try_into().unwrap())
    }

    fn entry_value(&self, mapping: &Mapping, index: u64) -> Result<Slot, ContainerError> {
        let bytes = mapping.read_at(self.entry_offset(index) + 9, 8)?;
        Ok(bytes.try_into().unwrap())
    }

    fn write_entry(&self, mapping: &mut Mapping, index: u64, key: Slot, value: Slot) -> Result<(), ContainerError> {
        let base = self.entry_offset(index);
        mapping.write_at(base, &[STATE_USED])?;
        mapping.write_at(base + 1, &key)?;
        mapping.write_at(base + 9, &value)?;
        Ok(())
    }

    fn write_value(&self, mapping: &mut Mapping, index: u64, value: Slot) -> Result<(), ContainerError> {
        mapping.write_at(self.entry_offset(index) + 9, &value)?;
        Ok(())
    }

    /// `i := (i<<2) + i + perturb + 1; perturb := perturb>>5`, the classical
    /// open-addressing probe sequence, seeded from `hash & (capacity - 1)`.
    fn probe(&self, mapping: &Mapping, key_codec: &dyn KeyCodec, key: &Slot) -> Result<Probe, ContainerError> {
        let capacity = self.capacity(mapping)?;
        let mask = capacity - 1;
        let hash = key_codec.hash(mapping, key);
        let mut index = hash & mask;
        let mut perturb = hash;

        loop {
            match self.entry_state(mapping, index)? {
                STATE_EMPTY => return Ok(Probe::Empty(index)),
                _ => {
                    let existing = self.entry_key(mapping, index)?;
                    if key_codec.eq(mapping, &existing, key) {
                        return Ok(Probe::Found(index));
                    }
                }
            }
            perturb >>= 5;
            index = ((index << 2).wrapping_add(index).wrapping_add(perturb).wrapping_add(1)) & mask;
        }
    }

    fn assert_room_for_insert(&self, mapping: &Mapping) -> Result<(), ContainerError> {
        let capacity = self.capacity(mapping)?;
        let used = self.used(mapping)?;
        if (used + 1) * 10 > capacity * 9 {
            return Err(ContainerError::Full);
        }
        Ok(())
    }

    /// Probes to an empty slot; if the slot was unused, sets its key and
    /// (if a value is supplied) value, then returns the persisted key slot.
    /// If the slot was already used, the provided value is ignored. The
    /// entry array is allocated once at [`HashTable::create`] — every write
    /// here lands in that pre-existing memory, never fresh allocation, so
    /// the touched ranges are returned for the caller to log explicitly.
    pub fn get_or_intern(
        &self,
        mapping: &mut Mapping,
        key_codec: &dyn KeyCodec,
        key: Slot,
        value: Option<Slot>,
    ) -> Result<(Slot, Vec<(Offset, u64)>), ContainerError> {
        match self.probe(mapping, key_codec, &key)? {
            Probe::Found(index) => Ok((self.entry_key(mapping, index)?, Vec::new())),
            Probe::Empty(index) => {
                self.assert_room_for_insert(mapping)?;
                self.write_entry(mapping, index, key, value.unwrap_or([0; 8]))?;
                let used = self.used(mapping)?;
                self.set_used(mapping, used + 1)?;
                Ok((key, vec![(self.entry_offset(index), ENTRY_SIZE), (self.offset + 8, 8)]))
            }
        }
    }

    /// Standard map lookup; fails `KeyNotFound` if `key` is absent.
    pub fn index(&self, mapping: &Mapping, key_codec: &dyn KeyCodec, key: Slot) -> Result<Slot, ContainerError> {
        match self.probe(mapping, key_codec, &key)? {
            Probe::Found(index) => self.entry_value(mapping, index),
            Probe::Empty(_) => Err(ContainerError::KeyNotFound),
        }
    }

    /// Standard map assignment; inserts `key` if absent. Returns the
    /// touched pre-existing byte ranges, for the same reason as
    /// [`HashTable::get_or_intern`].
    pub fn set(&self, mapping: &mut Mapping, key_codec: &dyn KeyCodec, key: Slot, value: Slot) -> Result<Vec<(Offset, u64)>, ContainerError> {
        match self.probe(mapping, key_codec, &key)? {
            Probe::Found(index) => {
                self.write_value(mapping, index, value)?;
                Ok(vec![(self.entry_offset(index) + 9, 8)])
            }
            Probe::Empty(index) => {
                self.assert_room_for_insert(mapping)?;
                self.write_entry(mapping, index, key, value)?;
                let used = self.used(mapping)?;
                self.set_used(mapping, used + 1)?;
                Ok(vec![(self.entry_offset(index), ENTRY_SIZE), (self.offset + 8, 8)])
            }
        }
    }

    /// Linear scan over in-use slots, in entry-array order.
    pub fn iter_keys(&self, mapping: &Mapping) -> Result<Vec<Slot>, ContainerError> {
        let capacity = self.capacity(mapping)?;
        let mut out = Vec::new();
        for index in 0..capacity {
            if self.entry_state(mapping, index)? == STATE_USED {
                out.push(self.entry_key(mapping, index)?);
            }
        }
        Ok(out)
    }

    pub fn iter_values(&self, mapping: &Mapping, value_type_defined: bool) -> Result<Vec<Slot>, ContainerError> {
        if !value_type_defined {
            return Err(ContainerError::Type);
        }
        let capacity = self.capacity(mapping)?;
        let mut out = Vec::new();
        for index in 0..capacity {
            if self.entry_state(mapping, index)? == STATE_USED {
                out.push(self.entry_value(mapping, index)?);
            }
        }
        Ok(out)
    }

    pub fn iter_items(&self, mapping: &Mapping, value_type_defined: bool) -> Result<Vec<(Slot, Slot)>, ContainerError> {
        if !value_type_defined {
            return Err(ContainerError::Type);
        }
        let capacity = self.capacity(mapping)?;
        let mut out = Vec::new();
        for index in 0..capacity {
            if self.entry_state(mapping, index)? == STATE_USED {
                out.push((self.entry_key(mapping, index)?, self.entry_value(mapping, index)?));
            }
        }
        Ok(out)
    }
}

/// Convenience for callers storing an [`Offset`] as a fixed-width slot.
pub fn offset_slot(offset: Offset) -> Slot {
    crate::key_codec::offset_to_slot(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_codec::RawSlotKey;
    use mapping::{Mapping as MappingTy, OpenedMapping};

    fn open_mapping() -> (tempfile::TempDir, MappingTy) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let OpenedMapping { mapping, .. } = MappingTy::open(&path, 4096 * 4).unwrap();
        (dir, mapping)
    }

    #[test]
    fn intern_is_idempotent() {
        let (_dir, mut mapping) = open_mapping();
        let table = HashTable::create(&mut mapping, 8).unwrap();
        let codec = RawSlotKey;
        let key = 42i64.to_le_bytes();

        let (a, a_touched) = table.get_or_intern(&mut mapping, &codec, key, None).unwrap();
        let (b, b_touched) = table.get_or_intern(&mut mapping, &codec, key, None).unwrap();
        assert_eq!(a, b);
        assert!(!a_touched.is_empty(), "first intern writes a fresh entry");
        assert!(b_touched.is_empty(), "repeated intern of an existing key touches nothing");
        assert_eq!(table.used(&mapping).unwrap(), 1);
    }

    #[test]
    fn set_and_index_roundtrip() {
        let (_dir, mut mapping) = open_mapping();
        let table = HashTable::create(&mut mapping, 8).unwrap();
        let codec = RawSlotKey;
        let key = 7i64.to_le_bytes();
        let value = 100i64.to_le_bytes();

        table.set(&mut mapping, &codec, key, value).unwrap();
        assert_eq!(table.index(&mapping, &codec, key).unwrap(), value);
    }

    #[test]
    fn lookup_of_absent_key_fails_key_not_found() {
        let (_dir, mut mapping) = open_mapping();
        let table = HashTable::create(&mut mapping, 8).unwrap();
        let codec = RawSlotKey;
        assert!(matches!(
            table.index(&mapping, &codec, 1i64.to_le_bytes()),
            Err(ContainerError::KeyNotFound)
        ));
    }

    #[test]
    fn insert_past_load_factor_cap_fails_full() {
        let (_dir, mut mapping) = open_mapping();
        // capacity_for(1) == 2; 0.9 load factor means only one slot may be used.
        let table = HashTable::create(&mut mapping, 1).unwrap();
        assert_eq!(table.capacity(&mapping).unwrap(), 2);
        let codec = RawSlotKey;
        table.set(&mut mapping, &codec, 1i64.to_le_bytes(), 0i64.to_le_bytes()).unwrap();
        assert!(matches!(
            table.set(&mut mapping, &codec, 2i64.to_le_bytes(), 0i64.to_le_bytes()),
            Err(ContainerError::Full)
        ));
    }
}
