//! A field descriptor: `(name, type, offset-in-containing-structure)`, and
//! the uniform read/write contract over a structure's backing bytes
//! (spec.md §4.3).

use crate::errors::ValueError;
use mapping::Offset;

/// Whether a field's slot holds the value directly or an [`Offset`] to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    ByValue { size: u32 },
    ByReference,
}

/// A named, typed, positioned field within a structure's layout.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub type_name: String,
    pub offset: u32,
    pub storage: StorageKind,
}

/// The outcome of reading a field out of a structure's bytes.
#[derive(Debug)]
pub enum FieldView<'a> {
    /// A by-value field: the raw bytes of its slot.
    Value(&'a [u8]),
    /// A by-reference field: the target offset, or `None` if null.
    Reference(Option<Offset>),
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, offset: u32, storage: StorageKind) -> Self {
        Field {
            name: name.into(),
            type_name: type_name.into(),
            offset,
            storage,
        }
    }

    /// Size, in bytes, this field occupies in its containing structure:
    /// `allocation_size` for by-value fields, `sizeof(Offset)` for
    /// by-reference ones (spec.md §4.3's assignment contract).
    pub fn slot_size(&self) -> u32 {
        match self.storage {
            StorageKind::ByValue { size } => size,
            StorageKind::ByReference => 8,
        }
    }

    fn slot_range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.slot_size() as usize
    }

    /// Reads this field at the structure whose bytes start at
    /// `structure_bytes[0]` (i.e. `structure_bytes` is already offset by
    /// the structure's base, `S`).
    pub fn read<'a>(&self, structure_bytes: &'a [u8]) -> Result<FieldView<'a>, ValueError> {
        let range = self.slot_range();
        let slot = structure_bytes
            .get(range)
            .ok_or(ValueError::SizeMismatch {
                expected: self.slot_size() as usize,
                actual: structure_bytes.len().saturating_sub(self.offset as usize),
            })?;
        Ok(match self.storage {
            StorageKind::ByValue { .. } => FieldView::Value(slot),
            StorageKind::ByReference => {
                let raw: [u8; 8] = slot.try_into().unwrap();
                let offset = u64::from_le_bytes(raw);
                FieldView::Reference(if offset == mapping::NULL { None } else { Some(offset) })
            }
        })
    }

    /// Writes `payload` directly into a by-value field's slot. `payload`
    /// must be exactly `slot_size()` bytes — the type's assignment rule has
    /// already memcpy'd the source's bytes or rendered the foreign value
    /// into this buffer before calling.
    pub fn write_value(&self, structure_bytes: &mut [u8], payload: &[u8]) -> Result<(), ValueError> {
        let StorageKind::ByValue { size } = self.storage else {
            return Err(ValueError::WrongStorageKind);
        };
        if payload.len() != size as usize {
            return Err(ValueError::SizeMismatch {
                expected: size as usize,
                actual: payload.len(),
            });
        }
        let range = self.slot_range();
        structure_bytes[range].copy_from_slice(payload);
        Ok(())
    }

    /// Stores (or clears, for `None`) a by-reference field's target offset.
    pub fn write_reference(&self, structure_bytes: &mut [u8], target: Option<Offset>) -> Result<(), ValueError> {
        if !matches!(self.storage, StorageKind::ByReference) {
            return Err(ValueError::WrongStorageKind);
        }
        let range = self.slot_range();
        structure_bytes[range].copy_from_slice(&target.unwrap_or(mapping::NULL).to_le_bytes());
        Ok(())
    }
}

/// Sorts field names lexicographically and assigns offsets in that order,
/// fixing a canonical structure layout stable across reopens regardless of
/// declaration order (spec.md §4.3).
pub fn layout_fields(mut fields: Vec<(String, String, StorageKind)>) -> Vec<Field> {
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    let mut offset = 0u32;
    fields
        .into_iter()
        .map(|(name, type_name, storage)| {
            let field = Field::new(name, type_name, offset, storage);
            offset += field.slot_size();
            field
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_sorts_lexicographically_and_packs_offsets() {
        let fields = layout_fields(vec![
            ("weight".into(), "Float".into(), StorageKind::ByValue { size: 8 }),
            ("age".into(), "Int".into(), StorageKind::ByValue { size: 8 }),
            ("name".into(), "ByteString".into(), StorageKind::ByReference),
        ]);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["age", "name", "weight"]);
        assert_eq!(fields[0].offset, 0);
        assert_eq!(fields[1].offset, 8);
        assert_eq!(fields[2].offset, 16);
    }

    #[test]
    fn reads_and_writes_by_value_field() {
        let field = Field::new("age", "Int", 0, StorageKind::ByValue { size: 8 });
        let mut buf = [0u8; 8];
        field.write_value(&mut buf, &27i64.to_le_bytes()).unwrap();
        match field.read(&buf).unwrap() {
            FieldView::Value(bytes) => assert_eq!(i64::from_le_bytes(bytes.try_into().unwrap()), 27),
            FieldView::Reference(_) => panic!("expected a value view"),
        }
    }

    #[test]
    fn null_reference_reads_as_none() {
        let field = Field::new("name", "ByteString", 0, StorageKind::ByReference);
        let buf = [0u8; 8];
        match field.read(&buf).unwrap() {
            FieldView::Reference(target) => assert_eq!(target, None),
            FieldView::Value(_) => panic!("expected a reference view"),
        }
    }

    #[test]
    fn writing_value_payload_to_reference_field_fails() {
        let field = Field::new("name", "ByteString", 0, StorageKind::ByReference);
        let mut buf = [0u8; 8];
        assert!(matches!(
            field.write_value(&mut buf, &[0; 8]),
            Err(ValueError::WrongStorageKind)
        ));
    }
}
