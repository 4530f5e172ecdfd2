//! The `Storage` façade (component G + glue): owns the mapping, the
//! optional redo log, and the reconstructed schema; mediates every
//! mutating operation through redo logging and proxy-lifecycle tracking
//! (spec.md §4.1–§4.8).

use crate::errors::StorageError;
use crate::proxy::{ProxyCounter, ProxyTicket};
use containers::key_codec::{offset_to_slot, slot_to_offset, ByteStringKey, KeyCodec, RawSlotKey, Slot};
use containers::{HashTable, LinkedList, SkipList};
use mapping::{Mapping, Offset, OpenedMapping};
use redo_log::RedoLog;
use schema::{NoVolatileBases, Schema, SchemaError, TypeDescriptor, VolatileResolver};
use std::path::{Path, PathBuf};
use values::byte_string;
use values::scalar::{FloatMut, FloatRef, IntMut, IntRef};
use values::{Field, FieldView};

const DEFAULT_REGISTRY_CAPACITY: u64 = 64;

/// Binds a mapped file to its reconstructed schema, string registry, root,
/// and (if enabled) redo log.
#[derive(Debug)]
pub struct Storage {
    mapping: Mapping,
    redo: Option<RedoLog>,
    schema: Schema,
    string_registry: HashTable,
    type_list: LinkedList,
    root_offset: Offset,
    proxies: ProxyCounter,
    closed: bool,
}

impl Storage {
    /// Opens (creating if absent) the primary file at `path`. `populate_schema`
    /// runs once, only on a freshly created file, to register every type
    /// (structures via [`Schema::define_structure`], everything else via
    /// [`Schema::define_named`]) before the root value is allocated; on
    /// reopen the persisted type list takes its place. `redo` enables
    /// crash-recoverable journaling.
    pub fn open(
        path: impl AsRef<Path>,
        file_size: u64,
        registry_capacity: Option<u64>,
        redo: Option<(PathBuf, u64)>,
        populate_schema: impl FnOnce(&mut Schema, &dyn VolatileResolver) -> Result<(), SchemaError>,
    ) -> Result<Storage, StorageError> {
        let OpenedMapping { mapping, created } = Mapping::open(path, file_size)?;
        let redo_log = match redo {
            Some((redo_path, capacity)) => Some(RedoLog::open(redo_path, capacity)?),
            None => None,
        };

        if created {
            Self::initialize(mapping, redo_log, registry_capacity, populate_schema)
        } else {
            Self::reopen(mapping, redo_log)
        }
    }

    fn initialize(
        mut mapping: Mapping,
        redo: Option<RedoLog>,
        registry_capacity: Option<u64>,
        populate_schema: impl FnOnce(&mut Schema, &dyn VolatileResolver) -> Result<(), SchemaError>,
    ) -> Result<Storage, StorageError> {
        let mut schema = Schema::new();
        populate_schema(&mut schema, &NoVolatileBases)?;

        let string_registry = HashTable::create(&mut mapping, registry_capacity.unwrap_or(DEFAULT_REGISTRY_CAPACITY))?;
        let type_list = LinkedList::create(&mut mapping)?;

        let codec = ByteStringKey;
        for (name, descriptor) in schema.named_descriptors_in_definition_order() {
            let encoded = encode_named_descriptor(name, &descriptor.encode());
            let key_offset = Self::alloc_byte_string(&mut mapping, &encoded)?;
            let (interned, _) = string_registry.get_or_intern(&mut mapping, &codec, offset_to_slot(key_offset), None)?;
            type_list.append(&mut mapping, interned)?;
        }

        let root_offset = match schema.structure("Root") {
            Ok(root_type) => {
                let alloc_size: u32 = root_type.fields.iter().map(|f| f.slot_size()).sum();
                mapping.allocate(alloc_size as u64)?
            }
            Err(_) => mapping.allocate(0)?,
        };

        mapping.commit(string_registry.offset(), type_list.offset(), root_offset)?;

        Ok(Storage {
            mapping,
            redo,
            schema,
            string_registry,
            type_list,
            root_offset,
            proxies: ProxyCounter::new(),
            closed: false,
        })
    }

    fn reopen(mut mapping: Mapping, redo: Option<RedoLog>) -> Result<Storage, StorageError> {
        if let Some(redo_log) = redo.as_ref() {
            let mut failure = None;
            redo_log.recover(|offset, bytes| {
                if failure.is_some() {
                    return;
                }
                if let Err(err) = mapping.write_at(offset, bytes) {
                    failure = Some(err);
                }
            })?;
            if let Some(err) = failure {
                return Err(StorageError::Corruption(format!("redo replay failed: {err}")));
            }
        }

        let (string_registry_offset, type_list_offset, root_offset) = {
            let header = mapping.current_header()?;
            (header.o2_string_registry()?, header.o2_pickled_type_list()?, header.o2_root()?)
        };

        let string_registry = HashTable::open(string_registry_offset);
        let type_list = LinkedList::open(type_list_offset);

        let mut schema = Schema::new();
        for interned in type_list.iterate(&mapping)? {
            let offset = slot_to_offset(interned);
            let bytes = Self::read_byte_string(&mapping, offset)?;
            let (name, descriptor_bytes) = decode_named_descriptor(&bytes)?;
            let descriptor = TypeDescriptor::decode(descriptor_bytes)?;
            schema.reconstruct_named(&name, descriptor)?;
        }

        Ok(Storage {
            mapping,
            redo,
            schema,
            string_registry,
            type_list,
            root_offset,
            proxies: ProxyCounter::new(),
            closed: false,
        })
    }

    fn alloc_byte_string(mapping: &mut Mapping, payload: &[u8]) -> Result<Offset, StorageError> {
        let mut encoded = vec![0u8; byte_string::encoded_len(payload)];
        byte_string::encode_into(&mut encoded, payload)?;
        let offset = mapping.allocate(encoded.len() as u64)?;
        mapping.write_at(offset, &encoded)?;
        Ok(offset)
    }

    fn read_byte_string(mapping: &Mapping, offset: Offset) -> Result<Vec<u8>, StorageError> {
        let prefix = mapping.read_at(offset, 4)?;
        let len = u32::from_le_bytes(prefix.try_into().unwrap()) as usize;
        Ok(mapping.read_at(offset, 4 + len)?[4..].to_vec())
    }

    fn assert_live(&self) -> Result<(), StorageError> {
        if self.closed {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Appends one redo record covering `[offset, offset+len)`, if
    /// journaling is enabled. Every public mutating operation on `Storage`
    /// calls this (directly, or via [`Storage::log_growth`]) immediately
    /// after touching mapped bytes, so every such mutation is represented
    /// in the log (spec.md's redo-coverage Open Question resolution).
    fn log_range(&mut self, offset: Offset, len: usize) -> Result<(), StorageError> {
        if len == 0 {
            return Ok(());
        }
        let Some(redo) = self.redo.as_mut() else { return Ok(()) };
        let bytes = self.mapping.read_at(offset, len)?.to_vec();
        let mut trx = redo.begin();
        trx.save(offset, &bytes)?;
        trx.commit(true)?;
        Ok(())
    }

    /// Logs every byte the allocator bumped over during a container/graph
    /// operation that may have allocated fresh, previously-zero regions —
    /// the bump allocator never reuses a range, so the delta is exactly
    /// what that operation wrote.
    fn log_growth(&mut self, pre_free_offset: Offset) -> Result<(), StorageError> {
        let post = self.mapping.free_offset();
        if post > pre_free_offset {
            self.log_range(pre_free_offset, (post - pre_free_offset) as usize)?;
        }
        Ok(())
    }

    /// [`Storage::log_growth`], plus a set of pre-existing byte ranges a
    /// container/graph operation overwrote in place (a list's head/tail
    /// header, a hash table's fixed entry slots, a skip list's predecessor
    /// pointers, a node's kind-dictionary header slot — none of these are
    /// fresh allocation, so `log_growth` alone would miss them). Everything
    /// is folded into one redo transaction, so recovery either replays the
    /// whole operation or none of it.
    fn log_mutation(&mut self, pre_free_offset: Offset, touched: &[(Offset, u64)]) -> Result<(), StorageError> {
        if self.redo.is_none() {
            return Ok(());
        }
        let post = self.mapping.free_offset();
        let mut ranges: Vec<(Offset, u64)> = Vec::with_capacity(touched.len() + 1);
        if post > pre_free_offset {
            ranges.push((pre_free_offset, post - pre_free_offset));
        }
        ranges.extend_from_slice(touched);
        if ranges.is_empty() {
            return Ok(());
        }
        let Some(redo) = self.redo.as_mut() else { return Ok(()) };
        let mut trx = redo.begin();
        for (offset, len) in ranges {
            let bytes = self.mapping.read_at(offset, len as usize)?.to_vec();
            trx.save(offset, &bytes)?;
        }
        trx.commit(true)?;
        Ok(())
    }

    /// Interns `payload` into the string registry, returning the offset of
    /// its (possibly pre-existing) byte-string allocation. Repeated calls
    /// with equal bytes return the same offset (spec.md §8 property 5).
    pub fn intern(&mut self, payload: &[u8]) -> Result<Offset, StorageError> {
        self.assert_live()?;
        let pre = self.mapping.free_offset();
        let key_offset = Self::alloc_byte_string(&mut self.mapping, payload)?;
        let (interned, touched) = self
            .string_registry
            .get_or_intern(&mut self.mapping, &ByteStringKey, offset_to_slot(key_offset), None)?;
        self.log_mutation(pre, &touched)?;
        Ok(slot_to_offset(interned))
    }

    pub fn read_byte_string_at(&self, offset: Offset) -> Result<Vec<u8>, StorageError> {
        Self::read_byte_string(&self.mapping, offset)
    }

    /// A proxy over the root value, excluded from the outstanding-proxy
    /// count (spec.md §4.8).
    pub fn root(&self) -> Result<StructureProxy, StorageError> {
        self.assert_live()?;
        self.open_structure_at("Root", self.root_offset, false)
    }

    /// Wraps an existing structure instance of `type_name` at `offset` in a
    /// counted proxy.
    pub fn open_structure(&self, type_name: &str, offset: Offset) -> Result<StructureProxy, StorageError> {
        self.assert_live()?;
        self.open_structure_at(type_name, offset, true)
    }

    fn open_structure_at(&self, type_name: &str, offset: Offset, counted: bool) -> Result<StructureProxy, StorageError> {
        let structure_type = self.schema.structure(type_name)?;
        let alloc_size: u32 = structure_type.fields.iter().map(|f| f.slot_size()).sum();
        Ok(StructureProxy {
            offset,
            alloc_size,
            type_name: type_name.to_string(),
            fields: structure_type.fields.clone(),
            _ticket: if counted { Some(self.proxies.spawn()) } else { None },
        })
    }

    /// Allocates and zero-initializes a fresh instance of `type_name`,
    /// returning a counted proxy over it.
    pub fn create_structure(&mut self, type_name: &str) -> Result<StructureProxy, StorageError> {
        self.assert_live()?;
        let structure_type = self.schema.structure(type_name)?;
        let alloc_size: u32 = structure_type.fields.iter().map(|f| f.slot_size()).sum();
        let pre = self.mapping.free_offset();
        let offset = self.mapping.allocate(alloc_size as u64)?;
        self.log_growth(pre)?;
        Ok(StructureProxy {
            offset,
            alloc_size,
            type_name: type_name.to_string(),
            fields: structure_type.fields.clone(),
            _ticket: Some(self.proxies.spawn()),
        })
    }

    fn codec_for(type_name: &str) -> Box<dyn KeyCodec> {
        match type_name {
            "ByteString" => Box::new(ByteStringKey),
            _ => Box::new(RawSlotKey),
        }
    }

    pub fn create_list(&mut self) -> Result<ListHandle, StorageError> {
        self.assert_live()?;
        let pre = self.mapping.free_offset();
        let list = LinkedList::create(&mut self.mapping)?;
        self.log_growth(pre)?;
        Ok(ListHandle { list })
    }

    pub fn open_list(&self, offset: Offset) -> ListHandle {
        ListHandle { list: LinkedList::open(offset) }
    }

    pub fn create_dict(&mut self, key_type: &str, requested: u64) -> Result<DictHandle, StorageError> {
        self.assert_live()?;
        let pre = self.mapping.free_offset();
        let table = HashTable::create(&mut self.mapping, requested)?;
        self.log_growth(pre)?;
        Ok(DictHandle {
            table,
            key_type: key_type.to_string(),
        })
    }

    pub fn open_dict(&self, key_type: &str, offset: Offset) -> DictHandle {
        DictHandle {
            table: HashTable::open(offset),
            key_type: key_type.to_string(),
        }
    }

    pub fn create_skip_list(&mut self, order: SkipListOrder) -> Result<SkipListHandle, StorageError> {
        self.assert_live()?;
        let pre = self.mapping.free_offset();
        let list = SkipList::create(&mut self.mapping)?;
        self.log_growth(pre)?;
        Ok(SkipListHandle { list, order })
    }

    pub fn open_skip_list(&self, order: SkipListOrder, offset: Offset) -> SkipListHandle {
        SkipListHandle {
            list: SkipList::open(offset),
            order,
        }
    }

    pub fn create_node(&mut self, type_name: &str, value: Slot) -> Result<NodeHandle, StorageError> {
        self.assert_live()?;
        let pre = self.mapping.free_offset();
        let node = graph::Node::create(&mut self.mapping, value)?;
        self.log_growth(pre)?;
        Ok(NodeHandle {
            node,
            type_name: type_name.to_string(),
        })
    }

    pub fn open_node(&self, type_name: &str, offset: Offset) -> NodeHandle {
        NodeHandle {
            node: graph::Node::open(offset),
            type_name: type_name.to_string(),
        }
    }

    /// Connects `from` to `to` under edge kind `kind`. Fails `Type` if
    /// `kind` was registered as an `Edge` type whose declared endpoint
    /// types don't match `from`/`to`'s (spec.md §4.6) — a check
    /// `graph::Edge` itself cannot make, having no notion of a schema. A
    /// `kind` with no registered `Edge` descriptor is allowed unchecked.
    pub fn connect(&mut self, kind: &str, from: &NodeHandle, to: &NodeHandle, value: Slot) -> Result<graph::Edge, StorageError> {
        self.assert_live()?;
        if let Some(TypeDescriptor::Edge { from_node, to_node, .. }) = self.schema.descriptor(kind) {
            if &from.type_name != from_node || &to.type_name != to_node {
                return Err(StorageError::Type(format!(
                    "edge '{kind}' expects ({from_node}, {to_node}), got ({}, {})",
                    from.type_name, to.type_name
                )));
            }
        }
        let pre = self.mapping.free_offset();
        let (edge, touched) = graph::Edge::connect(&mut self.mapping, kind, from.node, to.node, value)?;
        self.log_mutation(pre, &touched)?;
        Ok(edge)
    }

    /// The value slot stored at node creation (spec.md §8 scenario 5: a
    /// developer/program's interned-name offset, packed as a slot).
    pub fn node_value(&self, offset: Offset) -> Result<Slot, StorageError> {
        Ok(graph::Node::open(offset).value(&self.mapping)?)
    }

    /// The endpoint offsets of an edge returned by [`Storage::connect`] or
    /// [`NodeHandle::out_edges`]/[`NodeHandle::in_edges`] — a walk needs
    /// these to follow an edge to its other side without knowing the
    /// concrete node type in advance.
    pub fn edge_endpoints(&self, offset: Offset) -> Result<(Offset, Offset), StorageError> {
        let edge = graph::Edge::open(offset);
        Ok((edge.from_node(&self.mapping)?.offset(), edge.to_node(&self.mapping)?.offset()))
    }

    /// Durably publishes a new header revision (spec.md §8 property 2):
    /// the header's "current" slot flips and its revision strictly
    /// increases.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.assert_live()?;
        self.mapping
            .commit(self.string_registry.offset(), self.type_list.offset(), self.root_offset)?;
        Ok(())
    }

    /// Refuses with `Proxies` if any non-root proxy is outstanding;
    /// otherwise flushes a final header revision, marks the primary
    /// mapping closed, and closes the redo log (spec.md §4.8).
    pub fn close(&mut self) -> Result<(), StorageError> {
        self.assert_live()?;
        let outstanding = self.proxies.outstanding();
        if outstanding > 0 {
            return Err(StorageError::Proxies(outstanding));
        }
        self.flush()?;
        self.mapping.close()?;
        if let Some(redo) = self.redo.as_mut() {
            redo.close()?;
        }
        self.closed = true;
        Ok(())
    }
}

/// `name_len:u32(LE) ++ name_bytes ++ descriptor_bytes` — how a named
/// type's descriptor is packed into one byte-string allocation for the
/// persisted type list.
fn encode_named_descriptor(name: &str, descriptor_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + name.len() + descriptor_bytes.len());
    out.extend_from_slice(&(name.len() as u32).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(descriptor_bytes);
    out
}

fn decode_named_descriptor(bytes: &[u8]) -> Result<(String, &[u8]), StorageError> {
    if bytes.len() < 4 {
        return Err(StorageError::Corruption("truncated type-list entry".into()));
    }
    let name_len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
    let rest = &bytes[4..];
    if rest.len() < name_len {
        return Err(StorageError::Corruption("truncated type-list entry name".into()));
    }
    let name = String::from_utf8(rest[..name_len].to_vec())
        .map_err(|_| StorageError::Corruption("non-UTF8 type name in type list".into()))?;
    Ok((name, &rest[name_len..]))
}

/// A counted proxy over one structure instance: `(storage, offset, type)`
/// per spec.md §3.1, resolved against the mapping through `Storage`.
#[derive(Debug)]
pub struct StructureProxy {
    offset: Offset,
    alloc_size: u32,
    type_name: String,
    fields: Vec<Field>,
    _ticket: Option<ProxyTicket>,
}

impl StructureProxy {
    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_same_as(&self, other: &StructureProxy) -> bool {
        self.offset == other.offset
    }

    pub fn slot(&self) -> Slot {
        offset_to_slot(self.offset)
    }

    fn field(&self, name: &str) -> Result<&Field, StorageError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| StorageError::Type(format!("'{}' has no field '{name}'", self.type_name)))
    }

    fn read_bytes<'a>(&self, storage: &'a Storage) -> Result<&'a [u8], StorageError> {
        Ok(storage.mapping.read_at(self.offset, self.alloc_size as usize)?)
    }

    fn write_bytes<'a>(&self, storage: &'a mut Storage) -> Result<&'a mut [u8], StorageError> {
        Ok(storage.mapping.read_at_mut(self.offset, self.alloc_size as usize)?)
    }

    pub fn get_int(&self, storage: &Storage, name: &str) -> Result<i64, StorageError> {
        let field = self.field(name)?;
        match field.read(self.read_bytes(storage)?)? {
            FieldView::Value(slot) => Ok(IntRef::new(slot)?.get()),
            FieldView::Reference(_) => Err(StorageError::Type(format!("'{name}' is not an Int field"))),
        }
    }

    pub fn set_int(&self, storage: &mut Storage, name: &str, value: i64) -> Result<(), StorageError> {
        let field = self.field(name)?.clone();
        field.write_value(self.write_bytes(storage)?, &value.to_le_bytes())?;
        storage.log_range(self.offset + field.offset as u64, field.slot_size() as usize)
    }

    pub fn increment_int(&self, storage: &mut Storage, name: &str) -> Result<i64, StorageError> {
        let field = self.field(name)?.clone();
        let range = field.offset as usize..field.offset as usize + field.slot_size() as usize;
        let next = IntMut::new(&mut self.write_bytes(storage)?[range])?.increment();
        storage.log_range(self.offset + field.offset as u64, field.slot_size() as usize)?;
        Ok(next)
    }

    pub fn get_float(&self, storage: &Storage, name: &str) -> Result<f64, StorageError> {
        let field = self.field(name)?;
        match field.read(self.read_bytes(storage)?)? {
            FieldView::Value(slot) => Ok(FloatRef::new(slot)?.get()),
            FieldView::Reference(_) => Err(StorageError::Type(format!("'{name}' is not a Float field"))),
        }
    }

    pub fn set_float(&self, storage: &mut Storage, name: &str, value: f64) -> Result<(), StorageError> {
        let field = self.field(name)?.clone();
        field.write_value(self.write_bytes(storage)?, &value.to_le_bytes())?;
        storage.log_range(self.offset + field.offset as u64, field.slot_size() as usize)
    }

    pub fn add_float(&self, storage: &mut Storage, name: &str, delta: f64) -> Result<f64, StorageError> {
        let field = self.field(name)?.clone();
        let range = field.offset as usize..field.offset as usize + field.slot_size() as usize;
        let next = FloatMut::new(&mut self.write_bytes(storage)?[range])?.add(delta);
        storage.log_range(self.offset + field.offset as u64, field.slot_size() as usize)?;
        Ok(next)
    }

    /// Interns `payload` and stores the interned offset in `name`'s
    /// reference slot (spec.md §8 scenario 2).
    pub fn set_byte_string(&self, storage: &mut Storage, name: &str, payload: &[u8]) -> Result<(), StorageError> {
        let field = self.field(name)?.clone();
        let interned = storage.intern(payload)?;
        field.write_reference(self.write_bytes(storage)?, Some(interned))?;
        storage.log_range(self.offset + field.offset as u64, field.slot_size() as usize)
    }

    pub fn get_byte_string(&self, storage: &Storage, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let field = self.field(name)?;
        match field.read(self.read_bytes(storage)?)? {
            FieldView::Reference(None) => Ok(None),
            FieldView::Reference(Some(offset)) => Ok(Some(storage.read_byte_string_at(offset)?)),
            FieldView::Value(_) => Err(StorageError::Type(format!("'{name}' is not a reference field"))),
        }
    }

    /// Stores (or clears, for `None`) any other by-reference field — a
    /// list/dict/skip-list/node/structure offset the caller already holds.
    pub fn set_reference(&self, storage: &mut Storage, name: &str, target: Option<Offset>) -> Result<(), StorageError> {
        let field = self.field(name)?.clone();
        field.write_reference(self.write_bytes(storage)?, target)?;
        storage.log_range(self.offset + field.offset as u64, field.slot_size() as usize)
    }

    pub fn get_reference(&self, storage: &Storage, name: &str) -> Result<Option<Offset>, StorageError> {
        let field = self.field(name)?;
        match field.read(self.read_bytes(storage)?)? {
            FieldView::Reference(target) => Ok(target),
            FieldView::Value(_) => Err(StorageError::Type(format!("'{name}' is not a reference field"))),
        }
    }
}

/// A list of opaque 8-byte slots, in insertion order.
#[derive(Debug, Clone, Copy)]
pub struct ListHandle {
    list: LinkedList,
}

impl ListHandle {
    pub fn offset(&self) -> Offset {
        self.list.offset()
    }

    pub fn append(&self, storage: &mut Storage, value: Slot) -> Result<(), StorageError> {
        let pre = storage.mapping.free_offset();
        let (_, touched) = self.list.append(&mut storage.mapping, value)?;
        storage.log_mutation(pre, &touched)
    }

    pub fn iterate(&self, storage: &Storage) -> Result<Vec<Slot>, StorageError> {
        Ok(self.list.iterate(&storage.mapping)?)
    }
}

/// A hash table keyed by `key_type`'s natural hash/equality.
#[derive(Debug, Clone)]
pub struct DictHandle {
    table: HashTable,
    key_type: String,
}

impl DictHandle {
    pub fn offset(&self) -> Offset {
        self.table.offset()
    }

    pub fn set(&self, storage: &mut Storage, key: Slot, value: Slot) -> Result<(), StorageError> {
        let codec = Storage::codec_for(&self.key_type);
        let pre = storage.mapping.free_offset();
        let touched = self.table.set(&mut storage.mapping, codec.as_ref(), key, value)?;
        storage.log_mutation(pre, &touched)
    }

    pub fn get(&self, storage: &Storage, key: Slot) -> Result<Slot, StorageError> {
        let codec = Storage::codec_for(&self.key_type);
        Ok(self.table.index(&storage.mapping, codec.as_ref(), key)?)
    }
}

/// Which key a skip list orders by (spec.md §4.4.3's `OrderKey` resolution):
/// `Identity` for a list of bare scalars/byte strings, `StructField` to
/// order by one named field of a structure element (resolved against the
/// schema at the point of use, since the field's offset/storage kind isn't
/// known until then).
#[derive(Debug, Clone)]
pub enum SkipListOrder {
    Int,
    Float,
    ByteString,
    StructField { struct_type: String, field_name: String },
}

impl SkipListOrder {
    fn resolve(&self, schema: &Schema) -> Result<(containers::OrderKey, Box<dyn containers::KeyOrder>), StorageError> {
        match self {
            SkipListOrder::Int => Ok((containers::OrderKey::Identity, Box::new(containers::IntOrder))),
            SkipListOrder::Float => Ok((containers::OrderKey::Identity, Box::new(containers::FloatOrder))),
            SkipListOrder::ByteString => Ok((containers::OrderKey::Identity, Box::new(containers::ByteStringOrder))),
            SkipListOrder::StructField { struct_type, field_name } => {
                let structure = schema.structure(struct_type)?;
                let field = structure
                    .field(field_name)
                    .ok_or_else(|| StorageError::Type(format!("'{struct_type}' has no field '{field_name}'")))?;
                let order_key = containers::OrderKey::StructField {
                    offset: field.offset,
                    storage: field.storage,
                };
                let key_order: Box<dyn containers::KeyOrder> = match field.type_name.as_str() {
                    "Int" => Box::new(containers::IntOrder),
                    "Float" => Box::new(containers::FloatOrder),
                    "ByteString" => Box::new(containers::ByteStringOrder),
                    other => return Err(StorageError::Type(format!("skip-list ordering on field type '{other}' is not supported"))),
                };
                Ok((order_key, key_order))
            }
        }
    }
}

/// A skip list of scalar or byte-string values, kept in nondecreasing
/// order by the value's own identity.
#[derive(Debug)]
pub struct SkipListHandle {
    list: SkipList,
    order: SkipListOrder,
}

impl SkipListHandle {
    pub fn offset(&self) -> Offset {
        self.list.offset()
    }

    pub fn insert(&self, storage: &mut Storage, value: Slot) -> Result<(), StorageError> {
        let (order_key, key_order) = self.order.resolve(&storage.schema)?;
        let pre = storage.mapping.free_offset();
        let (_, touched) = self.list.insert(&mut storage.mapping, &order_key, key_order.as_ref(), value)?;
        storage.log_mutation(pre, &touched)
    }

    pub fn iterate(&self, storage: &Storage) -> Result<Vec<Slot>, StorageError> {
        let (order_key, key_order) = self.order.resolve(&storage.schema)?;
        Ok(self.list.iterate(&storage.mapping, &order_key, key_order.as_ref())?)
    }

    pub fn range(&self, storage: &Storage, from: Option<Slot>, to: Option<Slot>) -> Result<Vec<Slot>, StorageError> {
        let (order_key, key_order) = self.order.resolve(&storage.schema)?;
        Ok(self.list.range(&storage.mapping, &order_key, key_order.as_ref(), from, to)?)
    }
}

/// A graph node, tagged with its declared structure type for edge
/// endpoint-type checking.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    node: graph::Node,
    type_name: String,
}

impl NodeHandle {
    pub fn offset(&self) -> Offset {
        self.node.offset()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn value(&self, storage: &Storage) -> Result<Slot, StorageError> {
        Ok(self.node.value(&storage.mapping)?)
    }

    pub fn out_edges(&self, storage: &mut Storage, kind: &str) -> Result<Vec<Offset>, StorageError> {
        Ok(self.node.out_edges(&mut storage.mapping, kind)?)
    }

    pub fn in_edges(&self, storage: &mut Storage, kind: &str) -> Result<Vec<Offset>, StorageError> {
        Ok(self.node.in_edges(&mut storage.mapping, kind)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::OrderKeyDescriptor;
    use tempfile::tempdir;

    fn populate(schema: &mut Schema, resolver: &dyn VolatileResolver) -> Result<(), SchemaError> {
        let person_fields = vec![
            ("name".to_string(), "ByteString".to_string()),
            ("age".to_string(), "Int".to_string()),
            ("weight".to_string(), "Float".to_string()),
        ];
        schema.define_structure("Root", &[], person_fields.clone(), resolver)?;
        schema.define_structure("Agent", &[], person_fields, resolver)?;
        schema.define_named("Person", TypeDescriptor::Node { value: "ByteString".to_string() })?;
        schema.define_named("Software", TypeDescriptor::Node { value: "ByteString".to_string() })?;
        schema.define_named(
            "created",
            TypeDescriptor::Edge {
                value: "Float".to_string(),
                from_node: "Person".to_string(),
                to_node: "Software".to_string(),
            },
        )?;
        Ok(())
    }

    fn open_fresh(path: &std::path::Path) -> Storage {
        Storage::open(path, 1 << 20, None, None, populate).unwrap()
    }

    #[test]
    fn scalars_round_trip_through_the_root() {
        let dir = tempdir().unwrap();
        let mut storage = open_fresh(&dir.path().join("t.db"));

        let root = storage.root().unwrap();
        root.set_int(&mut storage, "age", 27).unwrap();
        root.set_float(&mut storage, "weight", 73.0).unwrap();
        assert_eq!(root.increment_int(&mut storage, "age").unwrap(), 28);
        assert!((root.add_float(&mut storage, "weight", 1.5).unwrap() - 74.5).abs() < 1e-9);
        storage.close().unwrap();
    }

    #[test]
    fn interning_is_idempotent_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut storage = open_fresh(&path);

        let first = storage.intern(b"James Bond").unwrap();
        let second = storage.intern(b"James Bond").unwrap();
        assert_eq!(first, second);

        let root = storage.root().unwrap();
        root.set_byte_string(&mut storage, "name", b"James Bond").unwrap();
        storage.close().unwrap();

        let storage = Storage::open(&path, 1 << 20, None, None, populate).unwrap();
        let root = storage.root().unwrap();
        assert_eq!(root.get_byte_string(&storage, "name").unwrap().as_deref(), Some(b"James Bond".as_slice()));
    }

    #[test]
    fn listed_structures_preserve_insertion_order_and_support_lookup_by_name() {
        let dir = tempdir().unwrap();
        let mut storage = open_fresh(&dir.path().join("t.db"));

        let list = storage.create_list().unwrap();
        let dict = storage.create_dict("ByteString", 8).unwrap();
        for (name, age) in [("Felix", 31i64), ("Moneypenny", 23), ("Tanner", 57)] {
            let agent = storage.create_structure("Agent").unwrap();
            agent.set_byte_string(&mut storage, "name", name.as_bytes()).unwrap();
            agent.set_int(&mut storage, "age", age).unwrap();
            list.append(&mut storage, agent.slot()).unwrap();
            let name_offset = storage.intern(name.as_bytes()).unwrap();
            dict.set(&mut storage, offset_to_slot(name_offset), agent.slot()).unwrap();
        }

        let names: Vec<String> = list
            .iterate(&storage)
            .unwrap()
            .into_iter()
            .map(|slot| {
                let proxy = storage.open_structure("Agent", slot_to_offset(slot)).unwrap();
                let bytes = proxy.get_byte_string(&storage, "name").unwrap().unwrap();
                String::from_utf8_lossy(&bytes).into_owned()
            })
            .collect();
        assert_eq!(names, vec!["Felix", "Moneypenny", "Tanner"]);

        let moneypenny_offset = storage.intern(b"Moneypenny").unwrap();
        let slot = dict.get(&storage, offset_to_slot(moneypenny_offset)).unwrap();
        let moneypenny = storage.open_structure("Agent", slot_to_offset(slot)).unwrap();
        assert_eq!(moneypenny.get_int(&storage, "age").unwrap(), 23);
        drop(moneypenny);
        storage.close().unwrap();
    }

    #[test]
    fn skip_list_keeps_values_in_order_and_supports_range_queries() {
        let dir = tempdir().unwrap();
        let mut storage = open_fresh(&dir.path().join("t.db"));

        let skip_list = storage.create_skip_list(SkipListOrder::Int).unwrap();
        for v in [5i64, 1, 4, 1, 3] {
            skip_list.insert(&mut storage, v.to_le_bytes()).unwrap();
        }

        let all: Vec<i64> = skip_list.iterate(&storage).unwrap().into_iter().map(i64::from_le_bytes).collect();
        assert_eq!(all, vec![1, 1, 3, 4, 5]);

        let below_four: Vec<i64> = skip_list
            .range(&storage, None, Some(4i64.to_le_bytes()))
            .unwrap()
            .into_iter()
            .map(i64::from_le_bytes)
            .collect();
        assert_eq!(below_four, vec![1, 1, 3]);
        storage.close().unwrap();
    }

    #[test]
    fn graph_walk_follows_typed_edges_between_nodes() {
        let dir = tempdir().unwrap();
        let mut storage = open_fresh(&dir.path().join("t.db"));

        let marko_offset = storage.intern(b"marko").unwrap();
        let marko = storage.create_node("Person", offset_to_slot(marko_offset)).unwrap();
        let lop_offset = storage.intern(b"lop").unwrap();
        let lop = storage.create_node("Software", offset_to_slot(lop_offset)).unwrap();

        storage.connect("created", &marko, &lop, 0.4f64.to_le_bytes()).unwrap();

        let edges = marko.out_edges(&mut storage, "created").unwrap();
        assert_eq!(edges.len(), 1);
        let (from, to) = storage.edge_endpoints(edges[0]).unwrap();
        assert_eq!(from, marko.offset());
        assert_eq!(to, lop.offset());
        let program_name_offset = slot_to_offset(storage.node_value(to).unwrap());
        assert_eq!(storage.read_byte_string_at(program_name_offset).unwrap(), b"lop");
        storage.close().unwrap();
    }

    #[test]
    fn close_refuses_while_a_proxy_is_outstanding() {
        let dir = tempdir().unwrap();
        let mut storage = open_fresh(&dir.path().join("t.db"));

        let agent = storage.create_structure("Agent").unwrap();
        agent.set_byte_string(&mut storage, "name", b"Q").unwrap();

        assert!(matches!(storage.close(), Err(StorageError::Proxies(1))));

        drop(agent);
        storage.close().unwrap();
    }
}
