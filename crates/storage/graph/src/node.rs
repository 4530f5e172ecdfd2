//! Graph nodes (spec.md §4.6): a typed value plus two per-kind incidence
//! dictionaries (out-edges, in-edges), each kind's list created on demand.

use crate::errors::GraphError;
use containers::key_codec::{ByteStringKey, Slot};
use containers::{DefaultDictionary, LinkedList};
use mapping::{Mapping, Offset, NULL};
use values::byte_string;

const HEADER_SIZE: u64 = 24; // value: [u8; 8], out_kinds: u64, in_kinds: u64
const KIND_DICTIONARY_CAPACITY: u64 = 4;

/// A node living at a fixed offset: its value slot, plus lazily-created
/// incidence dictionaries keyed by edge-kind name.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    offset: Offset,
}

impl Node {
    pub fn create(mapping: &mut Mapping, value: Slot) -> Result<Self, GraphError> {
        let offset = mapping.allocate(HEADER_SIZE)?;
        mapping.write_at(offset, &value)?;
        mapping.write_at(offset + 8, &NULL.to_le_bytes())?;
        mapping.write_at(offset + 16, &NULL.to_le_bytes())?;
        Ok(Node { offset })
    }

    pub fn open(offset: Offset) -> Self {
        Node { offset }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn value(&self, mapping: &Mapping) -> Result<Slot, GraphError> {
        Ok(mapping.read_at(self.offset, 8)?.try_into().unwrap())
    }

    fn kinds_offset(&self, direction: Direction) -> Offset {
        match direction {
            Direction::Out => self.offset + 8,
            Direction::In => self.offset + 16,
        }
    }

    /// Looks up (lazily creating) the per-direction kind dictionary. The
    /// dictionary itself is fresh allocation when created (covered by the
    /// caller's growth-delta logging); the node's own pre-existing header
    /// slot is rewritten to point at it, and that write is returned for the
    /// caller to log explicitly.
    fn kinds_dictionary(&self, mapping: &mut Mapping, direction: Direction) -> Result<(DefaultDictionary, Vec<(Offset, u64)>), GraphError> {
        let header_slot = self.kinds_offset(direction);
        let existing = u64::from_le_bytes(mapping.read_at(header_slot, 8)?.try_into().unwrap());
        if existing != NULL {
            return Ok((DefaultDictionary::open(containers::HashTable::open(existing)), Vec::new()));
        }
        let dict = DefaultDictionary::create(mapping, KIND_DICTIONARY_CAPACITY)?;
        mapping.write_at(header_slot, &dict.table().offset().to_le_bytes())?;
        Ok((dict, vec![(header_slot, 8)]))
    }

    /// Looks up (creating if absent) the incidence list for `kind` in the
    /// given direction, with every pre-existing byte range it overwrote.
    fn kind_list(&self, mapping: &mut Mapping, direction: Direction, kind: &str) -> Result<(LinkedList, Vec<(Offset, u64)>), GraphError> {
        let (dict, mut touched) = self.kinds_dictionary(mapping, direction)?;
        let codec = ByteStringKey;

        let payload = kind.as_bytes();
        let key_offset = mapping.allocate(byte_string::encoded_len(payload) as u64)?;
        let mut encoded = vec![0u8; byte_string::encoded_len(payload)];
        byte_string::encode_into(&mut encoded, payload)?;
        mapping.write_at(key_offset, &encoded)?;
        let key_slot = containers::key_codec::offset_to_slot(key_offset);

        let (list_offset_slot, index_touched) = dict.index(mapping, &codec, key_slot, |mapping| {
            let list = LinkedList::create(mapping)?;
            Ok(containers::key_codec::offset_to_slot(list.offset()))
        })?;
        touched.extend(index_touched);
        Ok((LinkedList::open(containers::key_codec::slot_to_offset(list_offset_slot)), touched))
    }

    /// Prepends `edge_offset` to this node's out-list for `kind`, returning
    /// every pre-existing byte range the operation overwrote.
    pub(crate) fn link_out(&self, mapping: &mut Mapping, kind: &str, edge_offset: Offset) -> Result<Vec<(Offset, u64)>, GraphError> {
        let (list, mut touched) = self.kind_list(mapping, Direction::Out, kind)?;
        let (_, insert_touched) = list.insert(mapping, containers::key_codec::offset_to_slot(edge_offset))?;
        touched.extend(insert_touched);
        Ok(touched)
    }

    /// Prepends `edge_offset` to this node's in-list for `kind`, returning
    /// every pre-existing byte range the operation overwrote.
    pub(crate) fn link_in(&self, mapping: &mut Mapping, kind: &str, edge_offset: Offset) -> Result<Vec<(Offset, u64)>, GraphError> {
        let (list, mut touched) = self.kind_list(mapping, Direction::In, kind)?;
        let (_, insert_touched) = list.insert(mapping, containers::key_codec::offset_to_slot(edge_offset))?;
        touched.extend(insert_touched);
        Ok(touched)
    }

    /// Out-edges of `kind`, most-recently-inserted-first. Empty if the kind
    /// was never used on this node.
    pub fn out_edges(&self, mapping: &mut Mapping, kind: &str) -> Result<Vec<Offset>, GraphError> {
        self.edges(mapping, Direction::Out, kind)
    }

    /// In-edges of `kind`, most-recently-inserted-first.
    pub fn in_edges(&self, mapping: &mut Mapping, kind: &str) -> Result<Vec<Offset>, GraphError> {
        self.edges(mapping, Direction::In, kind)
    }

    fn edges(&self, mapping: &mut Mapping, direction: Direction, kind: &str) -> Result<Vec<Offset>, GraphError> {
        let (list, _touched) = self.kind_list(mapping, direction, kind)?;
        Ok(list.iterate(mapping)?.into_iter().map(containers::key_codec::slot_to_offset).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Out,
    In,
}
