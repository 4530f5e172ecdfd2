//! Structure field layout and inheritance merge rules (spec.md §4.5).

use crate::errors::SchemaError;
use values::{Field, StorageKind};

/// A field before its canonical offset is assigned: `(name, type_name, storage)`.
pub type FieldSpec = (String, String, StorageKind);

/// A fully laid-out structure type: its canonical, offset-assigned fields.
#[derive(Debug, Clone)]
pub struct StructureType {
    pub class_name: String,
    pub fields: Vec<Field>,
}

impl StructureType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Merges a derived structure's own fields into its bases' concatenated
/// field list, applying spec.md §4.5's redefinition compatibility rules:
/// - same type or supertype redefinition: accepted, base field kept.
/// - subtype redefinition: takes effect, field's runtime type narrows.
/// - anything else: `Type` error (here, `IncompatibleRedefinition`).
pub fn merge_inherited_fields(
    base_fields: Vec<FieldSpec>,
    own_fields: Vec<FieldSpec>,
    is_subtype: impl Fn(&str, &str) -> bool,
    class_name: &str,
) -> Result<Vec<FieldSpec>, SchemaError> {
    let mut merged = base_fields;
    for (name, type_name, storage) in own_fields {
        if let Some(existing) = merged.iter_mut().find(|(n, _, _)| *n == name) {
            let existing_type = existing.1.clone();
            if type_name == existing_type {
                // Same type: accepted and ignored.
            } else if is_subtype(&type_name, &existing_type) {
                existing.1 = type_name;
                existing.2 = storage;
            } else if is_subtype(&existing_type, &type_name) {
                // Supertype redefinition: accepted and ignored.
            } else {
                return Err(SchemaError::IncompatibleRedefinition {
                    class_name: class_name.to_string(),
                    field: name,
                });
            }
        } else {
            merged.push((name, type_name, storage));
        }
    }
    Ok(merged)
}

/// Sorts field names lexicographically and assigns offsets in that order
/// (spec.md §4.3), producing the canonical layout.
pub fn layout(fields: Vec<FieldSpec>) -> Vec<Field> {
    values::field::layout_fields(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_field(name: &str) -> FieldSpec {
        (name.into(), "Int".into(), StorageKind::ByValue { size: 8 })
    }

    fn byte_string_field(name: &str) -> FieldSpec {
        (name.into(), "ByteString".into(), StorageKind::ByReference)
    }

    #[test]
    fn same_type_redefinition_is_accepted_and_ignored() {
        let base = vec![int_field("age")];
        let own = vec![int_field("age")];
        let merged = merge_inherited_fields(base, own, |_, _| false, "Derived").unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].1, "Int");
    }

    #[test]
    fn incompatible_redefinition_fails() {
        let base = vec![int_field("age")];
        let own = vec![byte_string_field("age")];
        let err = merge_inherited_fields(base, own, |_, _| false, "Derived").unwrap_err();
        assert!(matches!(err, SchemaError::IncompatibleRedefinition { .. }));
    }

    #[test]
    fn subtype_redefinition_takes_effect() {
        let base = vec![("pet".to_string(), "Animal".to_string(), StorageKind::ByReference)];
        let own = vec![("pet".to_string(), "Dog".to_string(), StorageKind::ByReference)];
        let merged = merge_inherited_fields(base, own, |a, b| a == "Dog" && b == "Animal", "Derived").unwrap();
        assert_eq!(merged[0].1, "Dog");
    }

    #[test]
    fn base_and_own_fields_concatenate_then_canonicalize() {
        let base = vec![int_field("age")];
        let own = vec![byte_string_field("name")];
        let merged = merge_inherited_fields(base, own, |_, _| false, "Derived").unwrap();
        let fields = layout(merged);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["age", "name"]);
    }
}
