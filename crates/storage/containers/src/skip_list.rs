//! Skip list (spec.md §4.4.3). Each node's level is drawn from a geometric
//! distribution `P[L >= k+1] = 1/3`; the head sentinel's next-pointer array
//! is reallocated and extended whenever an insert picks a new maximum
//! level — the bump allocator has no in-place growth, so the old array is
//! simply abandoned once the header's pointer is repointed at the new one.
//!
//! Open-question resolution (spec.md §4.4.3, §9 "script snippet"): key
//! extraction is a closed [`OrderKey`] enum persisted as part of the
//! skip-list type's descriptor, never executable code. `Identity` orders by
//! the stored value itself (by-value scalars and byte strings only,
//! matching the "value itself must be orderable" fallback); `StructField`
//! orders by one field of a by-reference structure value.

use crate::errors::ContainerError;
use crate::key_codec::Slot;
use mapping::{Mapping, Offset, NULL};
use rand::Rng;
use std::cmp::Ordering;
use values::{ByteStringRef, StorageKind};

const HEADER_SIZE: u64 = 12; // head_next_offset: u64, max_level: u32
const NODE_PREFIX_SIZE: u64 = 12; // level: u32, value: [u8; 8]
const POINTER_SIZE: u64 = 8;

/// Upper bound on a node's level; the geometric draw never exceeds this.
pub const MAX_LEVEL: u32 = 32;

/// How a skip list extracts the comparable key from a stored value slot.
/// Persisted verbatim as part of the list's type descriptor — a closed enum
/// tag rather than an executable script (spec.md §9).
#[derive(Debug, Clone, Copy)]
pub enum OrderKey {
    /// The stored value itself is the key (by-value scalars, byte strings).
    Identity,
    /// The key is one field of a by-reference structure value, read at
    /// `offset` with the given storage kind.
    StructField { offset: u32, storage: StorageKind },
}

impl OrderKey {
    /// Extracts the comparable key slot for `value`.
    pub fn extract(&self, mapping: &Mapping, value: &Slot) -> Result<Slot, ContainerError> {
        match self {
            OrderKey::Identity => Ok(*value),
            OrderKey::StructField { offset, storage } => {
                let struct_offset = u64::from_le_bytes(*value);
                match storage {
                    StorageKind::ByValue { size } => {
                        let bytes = mapping.read_at(struct_offset + *offset as u64, *size as usize)?;
                        let mut slot = [0u8; 8];
                        slot[..bytes.len()].copy_from_slice(bytes);
                        Ok(slot)
                    }
                    StorageKind::ByReference => {
                        let bytes = mapping.read_at(struct_offset + *offset as u64, 8)?;
                        Ok(bytes.try_into().unwrap())
                    }
                }
            }
        }
    }
}

/// Compares two already-[`OrderKey::extract`]ed key slots.
pub trait KeyOrder {
    fn compare(&self, mapping: &Mapping, a: &Slot, b: &Slot) -> Ordering;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntOrder;
impl KeyOrder for IntOrder {
    fn compare(&self, _mapping: &Mapping, a: &Slot, b: &Slot) -> Ordering {
        i64::from_le_bytes(*a).cmp(&i64::from_le_bytes(*b))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FloatOrder;
impl KeyOrder for FloatOrder {
    fn compare(&self, _mapping: &Mapping, a: &Slot, b: &Slot) -> Ordering {
        f64::from_le_bytes(*a).partial_cmp(&f64::from_le_bytes(*b)).unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ByteStringOrder;
impl KeyOrder for ByteStringOrder {
    fn compare(&self, mapping: &Mapping, a: &Slot, b: &Slot) -> Ordering {
        let read = |slot: &Slot| -> Vec<u8> {
            let offset = u64::from_le_bytes(*slot);
            let prefix = mapping.read_at(offset, 4).expect("valid byte string offset");
            let len = u32::from_le_bytes(prefix.try_into().unwrap()) as usize;
            let bytes = mapping.read_at(offset, 4 + len).expect("valid byte string offset");
            ByteStringRef::new(bytes).expect("well-formed byte string").as_bytes().to_vec()
        };
        read(a).cmp(&read(b))
    }
}

fn draw_level() -> u32 {
    let mut level = 1;
    let mut rng = rand::thread_rng();
    while level < MAX_LEVEL && rng.gen_bool(1.0 / 3.0) {
        level += 1;
    }
    level
}

/// A skip list living at a fixed offset in the mapping.
#[derive(Debug, Clone, Copy)]
pub struct SkipList {
    offset: Offset,
}

impl SkipList {
    pub fn create(mapping: &mut Mapping) -> Result<Self, ContainerError> {
        let offset = mapping.allocate(HEADER_SIZE)?;
        let head_array = mapping.allocate(POINTER_SIZE)?; // one level, all-NULL
        mapping.write_at(offset, &head_array.to_le_bytes())?;
        mapping.write_at(offset + 8, &1u32.to_le_bytes())?;
        Ok(SkipList { offset })
    }

    pub fn open(offset: Offset) -> Self {
        SkipList { offset }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    fn head_next_offset(&self, mapping: &Mapping) -> Result<Offset, ContainerError> {
        Ok(u64::from_le_bytes(mapping.read_at(self.offset, 8)?.try_into().unwrap()))
    }

    fn max_level(&self, mapping: &Mapping) -> Result<u32, ContainerError> {
        Ok(u32::from_le_bytes(mapping.read_at(self.offset + 8, 4)?.try_into().unwrap()))
    }

    fn set_head_next_offset(&self, mapping: &mut Mapping, value: Offset) -> Result<(), ContainerError> {
        mapping.write_at(self.offset, &value.to_le_bytes())?;
        Ok(())
    }

    fn set_max_level(&self, mapping: &mut Mapping, value: u32) -> Result<(), ContainerError> {
        mapping.write_at(self.offset + 8, &value.to_le_bytes())?;
        Ok(())
    }

    fn node_level(&self, mapping: &Mapping, node: Offset) -> Result<u32, ContainerError> {
        Ok(u32::from_le_bytes(mapping.read_at(node, 4)?.try_into().unwrap()))
    }

    fn node_value(&self, mapping: &Mapping, node: Offset) -> Result<Slot, ContainerError> {
        Ok(mapping.read_at(node + 4, 8)?.try_into().unwrap())
    }

    fn next_at(&self, mapping: &Mapping, owner: Offset, level: u32) -> Result<Offset, ContainerError> {
        if owner == NULL {
            let array = self.head_next_offset(mapping)?;
            let bytes = mapping.read_at(array + level as u64 * POINTER_SIZE, 8)?;
            Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
        } else {
            let node_level = self.node_level(mapping, owner)?;
            if level >= node_level {
                return Ok(NULL);
            }
            let bytes = mapping.read_at(owner + NODE_PREFIX_SIZE + level as u64 * POINTER_SIZE, 8)?;
            Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
        }
    }

    fn set_next_at(&self, mapping: &mut Mapping, owner: Offset, level: u32, target: Offset) -> Result<(), ContainerError> {
        if owner == NULL {
            let array = self.head_next_offset(mapping)?;
            mapping.write_at(array + level as u64 * POINTER_SIZE, &target.to_le_bytes())?;
        } else {
            mapping.write_at(owner + NODE_PREFIX_SIZE + level as u64 * POINTER_SIZE, &target.to_le_bytes())?;
        }
        Ok(())
    }

    /// Grows the head pointer array to `desired_level` slots if it's
    /// currently smaller, abandoning the old array (the bump allocator has
    /// no in-place growth). Returns whether it reallocated — when it did
    /// not, the head array is pre-existing memory the caller's splice is
    /// about to write into and must log explicitly.
    fn ensure_head_capacity(&self, mapping: &mut Mapping, desired_level: u32) -> Result<bool, ContainerError> {
        let current_max = self.max_level(mapping)?;
        if desired_level <= current_max {
            return Ok(false);
        }
        let old_array = self.head_next_offset(mapping)?;
        let old_bytes = mapping.read_at(old_array, current_max as usize * 8)?.to_vec();
        let new_array = mapping.allocate(desired_level as u64 * POINTER_SIZE)?;
        mapping.write_at(new_array, &old_bytes)?;
        self.set_head_next_offset(mapping, new_array)?;
        self.set_max_level(mapping, desired_level)?;
        Ok(true)
    }

    /// Finds, for every level from the current max down to 0, the last node
    /// whose extracted key orders strictly before `key` — the "cut list".
    fn find_cut_list(
        &self,
        mapping: &Mapping,
        order_key: &OrderKey,
        key_order: &dyn KeyOrder,
        key: &Slot,
    ) -> Result<Vec<Offset>, ContainerError> {
        let max_level = self.max_level(mapping)?;
        let mut update = vec![NULL; max_level as usize];
        let mut current = NULL;
        for level in (0..max_level).rev() {
            loop {
                let next = self.next_at(mapping, current, level)?;
                if next == NULL {
                    break;
                }
                let next_key = order_key.extract(mapping, &self.node_value(mapping, next)?)?;
                if key_order.compare(mapping, &next_key, key) == Ordering::Less {
                    current = next;
                } else {
                    break;
                }
            }
            update[level as usize] = current;
        }
        Ok(update)
    }

    /// Picks a random level, splices a new node in at every level up to it.
    /// The node itself and (when grown) the head array are fresh allocation,
    /// covered by the caller's growth-delta logging; splicing also rewrites
    /// each level's predecessor pointer — the head array's slot when the
    /// predecessor is the sentinel, otherwise a pre-existing node's pointer
    /// slot — both returned here so the caller can log them explicitly.
    pub fn insert(
        &self,
        mapping: &mut Mapping,
        order_key: &OrderKey,
        key_order: &dyn KeyOrder,
        value: Slot,
    ) -> Result<(Offset, Vec<(Offset, u64)>), ContainerError> {
        let key = order_key.extract(mapping, &value)?;
        let level = draw_level();
        let mut touched = Vec::new();
        if self.ensure_head_capacity(mapping, level)? {
            // header's head-pointer/max-level fields were rewritten in place.
            touched.push((self.offset, HEADER_SIZE));
        }
        let update = self.find_cut_list(mapping, order_key, key_order, &key)?;

        let size = NODE_PREFIX_SIZE + level as u64 * POINTER_SIZE;
        let node = mapping.allocate(size)?;
        mapping.write_at(node, &level.to_le_bytes())?;
        mapping.write_at(node + 4, &value)?;

        let head_array = self.head_next_offset(mapping)?;
        for lvl in 0..level {
            let pred = update[lvl as usize];
            let pred_next = self.next_at(mapping, pred, lvl)?;
            self.set_next_at(mapping, node, lvl, pred_next)?;
            self.set_next_at(mapping, pred, lvl, node)?;
            if pred == NULL {
                touched.push((head_array + lvl as u64 * POINTER_SIZE, POINTER_SIZE));
            } else {
                touched.push((pred + NODE_PREFIX_SIZE + lvl as u64 * POINTER_SIZE, POINTER_SIZE));
            }
        }
        Ok((node, touched))
    }

    /// First node whose key equals `key`; fails `KeyNotFound` if absent.
    pub fn find(&self, mapping: &Mapping, order_key: &OrderKey, key_order: &dyn KeyOrder, key: &Slot) -> Result<Slot, ContainerError> {
        let update = self.find_cut_list(mapping, order_key, key_order, key)?;
        let candidate = self.next_at(mapping, update[0], 0)?;
        if candidate == NULL {
            return Err(ContainerError::KeyNotFound);
        }
        let candidate_value = self.node_value(mapping, candidate)?;
        let candidate_key = order_key.extract(mapping, &candidate_value)?;
        if key_order.compare(mapping, &candidate_key, key) == Ordering::Equal {
            Ok(candidate_value)
        } else {
            Err(ContainerError::KeyNotFound)
        }
    }

    /// Values from the first node with key >= `from` (or the head, if
    /// `from` is `None`) up to the first node with key >= `to` (exclusive;
    /// or to the end, if `to` is `None`).
    pub fn range(
        &self,
        mapping: &Mapping,
        order_key: &OrderKey,
        key_order: &dyn KeyOrder,
        from: Option<Slot>,
        to: Option<Slot>,
    ) -> Result<Vec<Slot>, ContainerError> {
        let mut cursor = match from {
            Some(ref key) => {
                let update = self.find_cut_list(mapping, order_key, key_order, key)?;
                self.next_at(mapping, update[0], 0)?
            }
            None => self.next_at(mapping, NULL, 0)?,
        };

        let mut out = Vec::new();
        while cursor != NULL {
            let value = self.node_value(mapping, cursor)?;
            if let Some(ref to_key) = to {
                let key = order_key.extract(mapping, &value)?;
                if key_order.compare(mapping, &key, to_key) != Ordering::Less {
                    break;
                }
            }
            out.push(value);
            cursor = self.next_at(mapping, cursor, 0)?;
        }
        Ok(out)
    }

    /// Every value in nondecreasing key order — `range(None, None)`.
    pub fn iterate(&self, mapping: &Mapping, order_key: &OrderKey, key_order: &dyn KeyOrder) -> Result<Vec<Slot>, ContainerError> {
        self.range(mapping, order_key, key_order, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping::{Mapping as MappingTy, OpenedMapping};

    fn open_mapping() -> (tempfile::TempDir, MappingTy) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let OpenedMapping { mapping, .. } = MappingTy::open(&path, 4096 * 8).unwrap();
        (dir, mapping)
    }

    #[test]
    fn inserts_yield_nondecreasing_order() {
        let (_dir, mut mapping) = open_mapping();
        let list = SkipList::create(&mut mapping).unwrap();
        let order_key = OrderKey::Identity;
        let key_order = IntOrder;

        let lengths = [2, 5, 5, 3, 4, 4, 2, 6, 5, 7, 3];
        for len in lengths {
            let (_, touched) = list.insert(&mut mapping, &order_key, &key_order, (len as i64).to_le_bytes()).unwrap();
            assert!(!touched.is_empty(), "splicing always rewrites at least one predecessor pointer");
        }

        let values: Vec<i64> = list
            .iterate(&mapping, &order_key, &key_order)
            .unwrap()
            .into_iter()
            .map(i64::from_le_bytes)
            .collect();
        let mut sorted = lengths.map(|l| l as i64).to_vec();
        sorted.sort();
        assert_eq!(values, sorted);
    }

    #[test]
    fn range_below_and_above_a_bound() {
        let (_dir, mut mapping) = open_mapping();
        let list = SkipList::create(&mut mapping).unwrap();
        let order_key = OrderKey::Identity;
        let key_order = IntOrder;

        for len in [2, 5, 5, 3, 4] {
            list.insert(&mut mapping, &order_key, &key_order, (len as i64).to_le_bytes()).unwrap();
        }

        let below_three: Vec<i64> = list
            .range(&mapping, &order_key, &key_order, None, Some(3i64.to_le_bytes()))
            .unwrap()
            .into_iter()
            .map(i64::from_le_bytes)
            .collect();
        assert_eq!(below_three, vec![2]);

        let at_least_three: Vec<i64> = list
            .range(&mapping, &order_key, &key_order, Some(3i64.to_le_bytes()), None)
            .unwrap()
            .into_iter()
            .map(i64::from_le_bytes)
            .collect();
        assert_eq!(at_least_three, vec![3, 4, 5, 5]);
    }

    #[test]
    fn find_absent_key_fails_key_not_found() {
        let (_dir, mut mapping) = open_mapping();
        let list = SkipList::create(&mut mapping).unwrap();
        let order_key = OrderKey::Identity;
        let key_order = IntOrder;
        list.insert(&mut mapping, &order_key, &key_order, 10i64.to_le_bytes()).unwrap();
        assert!(matches!(
            list.find(&mapping, &order_key, &key_order, &99i64.to_le_bytes()),
            Err(ContainerError::KeyNotFound)
        ));
    }
}
