//! Singly linked list (spec.md §4.4.2). Head and tail offsets; each entry
//! is `{next_offset, inline_value_slot}`. Unbounded except by file capacity.

use crate::errors::ContainerError;
use crate::key_codec::Slot;
use mapping::{Mapping, Offset, NULL};

const HEADER_SIZE: u64 = 16; // head: u64, tail: u64
const ENTRY_SIZE: u64 = 16; // next_offset: u64, value: [u8; 8]

/// A singly linked list living at a fixed offset in the mapping.
#[derive(Debug, Clone, Copy)]
pub struct LinkedList {
    offset: Offset,
}

impl LinkedList {
    pub fn create(mapping: &mut Mapping) -> Result<Self, ContainerError> {
        let offset = mapping.allocate(HEADER_SIZE)?;
        mapping.write_at(offset, &NULL.to_le_bytes())?;
        mapping.write_at(offset + 8, &NULL.to_le_bytes())?;
        Ok(LinkedList { offset })
    }

    pub fn open(offset: Offset) -> Self {
        LinkedList { offset }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn head(&self, mapping: &Mapping) -> Result<Offset, ContainerError> {
        Ok(u64::from_le_bytes(mapping.read_at(self.offset, 8)?.try_into().unwrap()))
    }

    pub fn tail(&self, mapping: &Mapping) -> Result<Offset, ContainerError> {
        Ok(u64::from_le_bytes(mapping.read_at(self.offset + 8, 8)?.try_into().unwrap()))
    }

    fn set_head(&self, mapping: &mut Mapping, value: Offset) -> Result<(), ContainerError> {
        mapping.write_at(self.offset, &value.to_le_bytes())?;
        Ok(())
    }

    fn set_tail(&self, mapping: &mut Mapping, value: Offset) -> Result<(), ContainerError> {
        mapping.write_at(self.offset + 8, &value.to_le_bytes())?;
        Ok(())
    }

    fn entry_next(&self, mapping: &Mapping, entry: Offset) -> Result<Offset, ContainerError> {
        Ok(u64::from_le_bytes(mapping.read_at(entry, 8)?.try_into().unwrap()))
    }

    fn entry_value(&self, mapping: &Mapping, entry: Offset) -> Result<Slot, ContainerError> {
        Ok(mapping.read_at(entry + 8, 8)?.try_into().unwrap())
    }

    fn set_entry_next(&self, mapping: &mut Mapping, entry: Offset, next: Offset) -> Result<(), ContainerError> {
        mapping.write_at(entry, &next.to_le_bytes())?;
        Ok(())
    }

    fn allocate_entry(&self, mapping: &mut Mapping, next: Offset, value: Slot) -> Result<Offset, ContainerError> {
        let entry = mapping.allocate(ENTRY_SIZE)?;
        mapping.write_at(entry, &next.to_le_bytes())?;
        mapping.write_at(entry + 8, &value)?;
        Ok(entry)
    }

    /// Prepends `value`, in O(1). Besides the fresh entry (covered by the
    /// caller's own growth-delta logging), this rewrites the list's own
    /// pre-existing header — returned so the caller can log it too.
    pub fn insert(&self, mapping: &mut Mapping, value: Slot) -> Result<(Offset, Vec<(Offset, u64)>), ContainerError> {
        let old_head = self.head(mapping)?;
        let entry = self.allocate_entry(mapping, old_head, value)?;
        self.set_head(mapping, entry)?;
        if old_head == NULL {
            self.set_tail(mapping, entry)?;
        }
        Ok((entry, vec![(self.offset, HEADER_SIZE)]))
    }

    /// Appends `value`, in O(1) via the cached tail offset. Besides the
    /// fresh entry, this rewrites the list's own header and, when a tail
    /// already existed, that tail entry's `next` field — both pre-existing
    /// and returned for the caller to log.
    pub fn append(&self, mapping: &mut Mapping, value: Slot) -> Result<(Offset, Vec<(Offset, u64)>), ContainerError> {
        let entry = self.allocate_entry(mapping, NULL, value)?;
        let old_tail = self.tail(mapping)?;
        let mut touched = vec![(self.offset, HEADER_SIZE)];
        if old_tail == NULL {
            self.set_head(mapping, entry)?;
        } else {
            self.set_entry_next(mapping, old_tail, entry)?;
            touched.push((old_tail, 8));
        }
        self.set_tail(mapping, entry)?;
        Ok((entry, touched))
    }

    /// Yields every value from first to last.
    pub fn iterate(&self, mapping: &Mapping) -> Result<Vec<Slot>, ContainerError> {
        let mut out = Vec::new();
        let mut cursor = self.head(mapping)?;
        while cursor != NULL {
            out.push(self.entry_value(mapping, cursor)?);
            cursor = self.entry_next(mapping, cursor)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping::{Mapping as MappingTy, OpenedMapping};

    fn open_mapping() -> (tempfile::TempDir, MappingTy) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let OpenedMapping { mapping, .. } = MappingTy::open(&path, 4096 * 2).unwrap();
        (dir, mapping)
    }

    #[test]
    fn append_preserves_insertion_order() {
        let (_dir, mut mapping) = open_mapping();
        let list = LinkedList::create(&mut mapping).unwrap();
        list.append(&mut mapping, 1i64.to_le_bytes()).unwrap();
        let (_, second_touched) = list.append(&mut mapping, 2i64.to_le_bytes()).unwrap();
        list.append(&mut mapping, 3i64.to_le_bytes()).unwrap();
        // appending past the first entry rewrites the old tail's `next` field.
        assert!(second_touched.len() >= 2);

        let values: Vec<i64> = list
            .iterate(&mapping)
            .unwrap()
            .into_iter()
            .map(i64::from_le_bytes)
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn insert_prepends() {
        let (_dir, mut mapping) = open_mapping();
        let list = LinkedList::create(&mut mapping).unwrap();
        list.insert(&mut mapping, 1i64.to_le_bytes()).unwrap();
        list.insert(&mut mapping, 2i64.to_le_bytes()).unwrap();

        let values: Vec<i64> = list
            .iterate(&mapping)
            .unwrap()
            .into_iter()
            .map(i64::from_le_bytes)
            .collect();
        assert_eq!(values, vec![2, 1]);
    }
}
