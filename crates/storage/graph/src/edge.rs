//! Graph edges (spec.md §4.6): a typed value tying a from-node to a
//! to-node, inserted at construction into both endpoints' per-kind
//! incidence lists.

use crate::errors::GraphError;
use crate::node::Node;
use containers::key_codec::Slot;
use mapping::{Mapping, Offset};

const HEADER_SIZE: u64 = 24; // value: [u8; 8], from_node: u64, to_node: u64

/// An edge living at a fixed offset: its value slot and its two endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    offset: Offset,
}

impl Edge {
    /// Allocates the edge record and prepends it to `from`'s out-list and
    /// `to`'s in-list for `kind`, both O(1). Node-type compatibility is the
    /// caller's responsibility (the storage layer that knows node types);
    /// this layer only performs the incidence-list mechanics. Returns every
    /// pre-existing byte range the two incidence-list links overwrote,
    /// beyond the fresh edge record itself, for the caller to log.
    pub fn connect(mapping: &mut Mapping, kind: &str, from: Node, to: Node, value: Slot) -> Result<(Self, Vec<(Offset, u64)>), GraphError> {
        let offset = mapping.allocate(HEADER_SIZE)?;
        mapping.write_at(offset, &value)?;
        mapping.write_at(offset + 8, &from.offset().to_le_bytes())?;
        mapping.write_at(offset + 16, &to.offset().to_le_bytes())?;
        let edge = Edge { offset };

        let mut touched = from.link_out(mapping, kind, offset)?;
        touched.extend(to.link_in(mapping, kind, offset)?);
        Ok((edge, touched))
    }

    pub fn open(offset: Offset) -> Self {
        Edge { offset }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn value(&self, mapping: &Mapping) -> Result<Slot, GraphError> {
        Ok(mapping.read_at(self.offset, 8)?.try_into().unwrap())
    }

    pub fn from_node(&self, mapping: &Mapping) -> Result<Node, GraphError> {
        let offset = u64::from_le_bytes(mapping.read_at(self.offset + 8, 8)?.try_into().unwrap());
        Ok(Node::open(offset))
    }

    pub fn to_node(&self, mapping: &Mapping) -> Result<Node, GraphError> {
        let offset = u64::from_le_bytes(mapping.read_at(self.offset + 16, 8)?.try_into().unwrap());
        Ok(Node::open(offset))
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
    fn connecting_an_edge_links_both_incidence_lists() {
        let (_dir, mut mapping) = open_mapping();
        let alice = Node::create(&mut mapping, 1i64.to_le_bytes()).unwrap();
        let bob = Node::create(&mut mapping, 2i64.to_le_bytes()).unwrap();

        let (edge, touched) = Edge::connect(&mut mapping, "knows", alice, bob, 0i64.to_le_bytes()).unwrap();
        assert!(!touched.is_empty(), "linking into both incidence lists rewrites their headers");

        let alice_out: Vec<Offset> = alice.out_edges(&mut mapping, "knows").unwrap();
        let bob_in: Vec<Offset> = bob.in_edges(&mut mapping, "knows").unwrap();
        assert_eq!(alice_out, vec![edge.offset()]);
        assert_eq!(bob_in, vec![edge.offset()]);
        assert!(alice.in_edges(&mut mapping, "knows").unwrap().is_empty());
        assert!(bob.out_edges(&mut mapping, "knows").unwrap().is_empty());
    }

    #[test]
    fn most_recently_inserted_edge_comes_first() {
        let (_dir, mut mapping) = open_mapping();
        let alice = Node::create(&mut mapping, 1i64.to_le_bytes()).unwrap();
        let bob = Node::create(&mut mapping, 2i64.to_le_bytes()).unwrap();
        let carol = Node::create(&mut mapping, 3i64.to_le_bytes()).unwrap();

        let (first, _) = Edge::connect(&mut mapping, "knows", alice, bob, 0i64.to_le_bytes()).unwrap();
        let (second, _) = Edge::connect(&mut mapping, "knows", alice, carol, 0i64.to_le_bytes()).unwrap();

        let out = alice.out_edges(&mut mapping, "knows").unwrap();
        assert_eq!(out, vec![second.offset(), first.offset()]);
    }

    #[test]
    fn distinct_kinds_keep_separate_lists() {
        let (_dir, mut mapping) = open_mapping();
        let alice = Node::create(&mut mapping, 1i64.to_le_bytes()).unwrap();
        let bob = Node::create(&mut mapping, 2i64.to_le_bytes()).unwrap();

        let (knows, _) = Edge::connect(&mut mapping, "knows", alice, bob, 0i64.to_le_bytes()).unwrap();
        let (blocks, _) = Edge::connect(&mut mapping, "blocks", alice, bob, 0i64.to_le_bytes()).unwrap();

        assert_eq!(alice.out_edges(&mut mapping, "knows").unwrap(), vec![knows.offset()]);
        assert_eq!(alice.out_edges(&mut mapping, "blocks").unwrap(), vec![blocks.offset()]);
    }
}
