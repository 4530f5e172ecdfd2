//! Reflective type descriptors and their stable, self-describing encoding
//! (spec.md §4.5): a tagged, length-prefixed record per type, so a
//! reopened file can reconstruct exactly the same schema.

use crate::errors::SchemaError;
use containers::OrderKey as ContainerOrderKey;

/// How a skip list's `OrderKey` is persisted: `StructField` refers to the
/// field by name rather than by offset, since offsets are recomputed
/// deterministically from the field's canonical (sorted) layout on reopen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKeyDescriptor {
    Identity,
    StructField { field_name: String },
}

/// A reflective, persistable description of one named, user-visible type.
/// Every referenced type is itself referred to by name (spec.md §4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Int,
    Float,
    ByteString,
    ForeignBuffer,
    HashTable {
        key: String,
        value: Option<String>,
    },
    List {
        value: String,
    },
    SkipList {
        value: String,
        order_key: OrderKeyDescriptor,
    },
    DefaultDictionary {
        key: String,
        value: String,
    },
    Node {
        value: String,
    },
    Edge {
        value: String,
        from_node: String,
        to_node: String,
    },
    Structure {
        class_name: String,
        bases: Vec<String>,
        extra_attrs: Vec<(String, String)>,
        fields: Vec<(String, String)>,
    },
}

// Tags for the encoding. Stable once shipped — reordering would break
// reopening files written by an earlier version.
const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_BYTE_STRING: u8 = 3;
const TAG_FOREIGN_BUFFER: u8 = 4;
const TAG_HASH_TABLE: u8 = 5;
const TAG_LIST: u8 = 6;
const TAG_SKIP_LIST: u8 = 7;
const TAG_DEFAULT_DICTIONARY: u8 = 8;
const TAG_NODE: u8 = 9;
const TAG_EDGE: u8 = 10;
const TAG_STRUCTURE: u8 = 11;

const ORDER_KEY_IDENTITY: u8 = 0;
const ORDER_KEY_STRUCT_FIELD: u8 = 1;

fn write_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn read_string(buf: &[u8], cursor: &mut usize) -> Result<String, SchemaError> {
    let too_short = || SchemaError::MalformedDescriptor("truncated string".into());
    let len = u16::from_le_bytes(buf.get(*cursor..*cursor + 2).ok_or_else(too_short)?.try_into().unwrap()) as usize;
    *cursor += 2;
    let bytes = buf.get(*cursor..*cursor + len).ok_or_else(too_short)?;
    *cursor += len;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn write_opt_string(out: &mut Vec<u8>, value: &Option<String>) {
    match value {
        Some(s) => {
            out.push(1);
            write_string(out, s);
        }
        None => out.push(0),
    }
}

fn read_opt_string(buf: &[u8], cursor: &mut usize) -> Result<Option<String>, SchemaError> {
    let tag = *buf.get(*cursor).ok_or_else(|| SchemaError::MalformedDescriptor("truncated option".into()))?;
    *cursor += 1;
    if tag == 0 {
        Ok(None)
    } else {
        Ok(Some(read_string(buf, cursor)?))
    }
}

fn write_string_vec(out: &mut Vec<u8>, values: &[String]) {
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        write_string(out, v);
    }
}

fn read_string_vec(buf: &[u8], cursor: &mut usize) -> Result<Vec<String>, SchemaError> {
    let too_short = || SchemaError::MalformedDescriptor("truncated vector".into());
    let count = u32::from_le_bytes(buf.get(*cursor..*cursor + 4).ok_or_else(too_short)?.try_into().unwrap());
    *cursor += 4;
    (0..count).map(|_| read_string(buf, cursor)).collect()
}

fn write_pair_vec(out: &mut Vec<u8>, values: &[(String, String)]) {
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for (a, b) in values {
        write_string(out, a);
        write_string(out, b);
    }
}

fn read_pair_vec(buf: &[u8], cursor: &mut usize) -> Result<Vec<(String, String)>, SchemaError> {
    let too_short = || SchemaError::MalformedDescriptor("truncated pair vector".into());
    let count = u32::from_le_bytes(buf.get(*cursor..*cursor + 4).ok_or_else(too_short)?.try_into().unwrap());
    *cursor += 4;
    (0..count)
        .map(|_| Ok((read_string(buf, cursor)?, read_string(buf, cursor)?)))
        .collect()
}

fn write_order_key(out: &mut Vec<u8>, order_key: &OrderKeyDescriptor) {
    match order_key {
        OrderKeyDescriptor::Identity => out.push(ORDER_KEY_IDENTITY),
        OrderKeyDescriptor::StructField { field_name } => {
            out.push(ORDER_KEY_STRUCT_FIELD);
            write_string(out, field_name);
        }
    }
}

fn read_order_key(buf: &[u8], cursor: &mut usize) -> Result<OrderKeyDescriptor, SchemaError> {
    let tag = *buf.get(*cursor).ok_or_else(|| SchemaError::MalformedDescriptor("truncated order key".into()))?;
    *cursor += 1;
    match tag {
        ORDER_KEY_IDENTITY => Ok(OrderKeyDescriptor::Identity),
        ORDER_KEY_STRUCT_FIELD => Ok(OrderKeyDescriptor::StructField {
            field_name: read_string(buf, cursor)?,
        }),
        other => Err(SchemaError::MalformedDescriptor(format!("unknown order key tag {other}"))),
    }
}

impl TypeDescriptor {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            TypeDescriptor::Int => out.push(TAG_INT),
            TypeDescriptor::Float => out.push(TAG_FLOAT),
            TypeDescriptor::ByteString => out.push(TAG_BYTE_STRING),
            TypeDescriptor::ForeignBuffer => out.push(TAG_FOREIGN_BUFFER),
            TypeDescriptor::HashTable { key, value } => {
                out.push(TAG_HASH_TABLE);
                write_string(&mut out, key);
                write_opt_string(&mut out, value);
            }
            TypeDescriptor::List { value } => {
                out.push(TAG_LIST);
                write_string(&mut out, value);
            }
            TypeDescriptor::SkipList { value, order_key } => {
                out.push(TAG_SKIP_LIST);
                write_string(&mut out, value);
                write_order_key(&mut out, order_key);
            }
            TypeDescriptor::DefaultDictionary { key, value } => {
                out.push(TAG_DEFAULT_DICTIONARY);
                write_string(&mut out, key);
                write_string(&mut out, value);
            }
            TypeDescriptor::Node { value } => {
                out.push(TAG_NODE);
                write_string(&mut out, value);
            }
            TypeDescriptor::Edge { value, from_node, to_node } => {
                out.push(TAG_EDGE);
                write_string(&mut out, value);
                write_string(&mut out, from_node);
                write_string(&mut out, to_node);
            }
            TypeDescriptor::Structure { class_name, bases, extra_attrs, fields } => {
                out.push(TAG_STRUCTURE);
                write_string(&mut out, class_name);
                write_string_vec(&mut out, bases);
                write_pair_vec(&mut out, extra_attrs);
                write_pair_vec(&mut out, fields);
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, SchemaError> {
        let tag = *buf.first().ok_or_else(|| SchemaError::MalformedDescriptor("empty descriptor".into()))?;
        let mut cursor = 1usize;
        Ok(match tag {
            TAG_INT => TypeDescriptor::Int,
            TAG_FLOAT => TypeDescriptor::Float,
            TAG_BYTE_STRING => TypeDescriptor::ByteString,
            TAG_FOREIGN_BUFFER => TypeDescriptor::ForeignBuffer,
            TAG_HASH_TABLE => TypeDescriptor::HashTable {
                key: read_string(buf, &mut cursor)?,
                value: read_opt_string(buf, &mut cursor)?,
            },
            TAG_LIST => TypeDescriptor::List {
                value: read_string(buf, &mut cursor)?,
            },
            TAG_SKIP_LIST => TypeDescriptor::SkipList {
                value: read_string(buf, &mut cursor)?,
                order_key: read_order_key(buf, &mut cursor)?,
            },
            TAG_DEFAULT_DICTIONARY => TypeDescriptor::DefaultDictionary {
                key: read_string(buf, &mut cursor)?,
                value: read_string(buf, &mut cursor)?,
            },
            TAG_NODE => TypeDescriptor::Node {
                value: read_string(buf, &mut cursor)?,
            },
            TAG_EDGE => TypeDescriptor::Edge {
                value: read_string(buf, &mut cursor)?,
                from_node: read_string(buf, &mut cursor)?,
                to_node: read_string(buf, &mut cursor)?,
            },
            TAG_STRUCTURE => TypeDescriptor::Structure {
                class_name: read_string(buf, &mut cursor)?,
                bases: read_string_vec(buf, &mut cursor)?,
                extra_attrs: read_pair_vec(buf, &mut cursor)?,
                fields: read_pair_vec(buf, &mut cursor)?,
            },
            other => return Err(SchemaError::MalformedDescriptor(format!("unknown type tag {other}"))),
        })
    }
}

/// Converts a runtime [`containers::OrderKey`] (which needs a resolved
/// field offset and storage kind) into its persistable, name-based form.
pub fn describe_order_key(order_key: &ContainerOrderKey, field_name_for_offset: impl Fn(u32) -> Option<String>) -> OrderKeyDescriptor {
    match order_key {
        ContainerOrderKey::Identity => OrderKeyDescriptor::Identity,
        ContainerOrderKey::StructField { offset, .. } => OrderKeyDescriptor::StructField {
            field_name: field_name_for_offset(*offset).unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_structure_descriptor() {
        let descriptor = TypeDescriptor::Structure {
            class_name: "Agent".into(),
            bases: vec![],
            extra_attrs: vec![],
            fields: vec![
                ("name".into(), "ByteString".into()),
                ("age".into(), "Int".into()),
                ("weight".into(), "Float".into()),
            ],
        };
        let encoded = descriptor.encode();
        assert_eq!(TypeDescriptor::decode(&encoded).unwrap(), descriptor);
    }

    #[test]
    fn round_trips_a_skip_list_descriptor_with_struct_field_order() {
        let descriptor = TypeDescriptor::SkipList {
            value: "Int".into(),
            order_key: OrderKeyDescriptor::StructField { field_name: "age".into() },
        };
        let encoded = descriptor.encode();
        assert_eq!(TypeDescriptor::decode(&encoded).unwrap(), descriptor);
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(TypeDescriptor::decode(&[255]).is_err());
    }
}
