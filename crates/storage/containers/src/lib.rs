//! Component D: the container types built over the mapping and value
//! layers — hash table, singly linked list, skip list, and default
//! dictionary (spec.md §4.4).

pub mod dictionary;
pub mod errors;
pub mod hash_table;
pub mod key_codec;
pub mod linked_list;
pub mod skip_list;

pub use dictionary::DefaultDictionary;
pub use errors::ContainerError;
pub use hash_table::HashTable;
pub use key_codec::{ByteStringKey, KeyCodec, RawSlotKey, Slot};
pub use linked_list::LinkedList;
pub use skip_list::{ByteStringOrder, FloatOrder, IntOrder, KeyOrder, OrderKey, SkipList};
