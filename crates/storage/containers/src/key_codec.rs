//! How a container's key/value slots (always a fixed 8 bytes — a by-value
//! scalar's bytes, or an [`Offset`] to a by-reference value) are hashed and
//! compared. Spec.md §4.4.1: "by-value types hash their byte contents;
//! by-reference types (other than byte string) hash their offset; byte
//! string hashes its contents." Containers are generic over key type, so
//! this is supplied by the caller rather than hardcoded.

use mapping::{Mapping, Offset};
use values::ByteStringRef;

/// A fixed-width (8-byte) key or value slot as stored inline in a container
/// entry: either a by-value scalar's raw bytes or a by-reference [`Offset`].
pub type Slot = [u8; 8];

/// Hashes and compares [`Slot`]s, dereferencing through the mapping when the
/// underlying type is by-reference.
pub trait KeyCodec {
    fn hash(&self, mapping: &Mapping, slot: &Slot) -> u64;
    fn eq(&self, mapping: &Mapping, a: &Slot, b: &Slot) -> bool;
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A by-value scalar (`Int`/`Float`) or a by-reference type other than
/// `ByteString`: hashes/compares the raw 8-byte slot directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawSlotKey;

impl KeyCodec for RawSlotKey {
    fn hash(&self, _mapping: &Mapping, slot: &Slot) -> u64 {
        fnv1a(slot)
    }

    fn eq(&self, _mapping: &Mapping, a: &Slot, b: &Slot) -> bool {
        a == b
    }
}

/// A `ByteString` key: the slot holds an [`Offset`] to the allocation;
/// hashing and equality dereference into the mapping and operate on the
/// referenced bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteStringKey;

impl ByteStringKey {
    fn read<'a>(&self, mapping: &'a Mapping, slot: &Slot) -> ByteStringRef<'a> {
        let offset = u64::from_le_bytes(*slot);
        // Length is read twice (once here, once inside `ByteStringRef::new`)
        // to size the slice; cheap relative to the mmap access itself.
        let prefix = mapping.read_at(offset, 4).expect("valid byte string offset");
        let len = u32::from_le_bytes(prefix.try_into().unwrap()) as usize;
        let bytes = mapping
            .read_at(offset, 4 + len)
            .expect("valid byte string offset");
        ByteStringRef::new(bytes).expect("well-formed byte string")
    }
}

impl KeyCodec for ByteStringKey {
    fn hash(&self, mapping: &Mapping, slot: &Slot) -> u64 {
        if u64::from_le_bytes(*slot) == mapping::NULL {
            return 0;
        }
        fnv1a(self.read(mapping, slot).as_bytes())
    }

    fn eq(&self, mapping: &Mapping, a: &Slot, b: &Slot) -> bool {
        let (oa, ob) = (u64::from_le_bytes(*a), u64::from_le_bytes(*b));
        if oa == ob {
            return true;
        }
        if oa == mapping::NULL || ob == mapping::NULL {
            return false;
        }
        self.read(mapping, a).as_bytes() == self.read(mapping, b).as_bytes()
    }
}

/// Encodes an [`Offset`] as a fixed-width key/value slot.
pub fn offset_to_slot(offset: Offset) -> Slot {
    offset.to_le_bytes()
}

/// Decodes an [`Offset`] previously encoded with [`offset_to_slot`].
pub fn slot_to_offset(slot: Slot) -> Offset {
    u64::from_le_bytes(slot)
}
