//! The per-storage type namespace (spec.md §4.5): defines and looks up
//! structure types, tracks declared subtype relationships, and persists/
//! reconstructs the reflective descriptor list across reopens.

use crate::descriptor::TypeDescriptor;
use crate::errors::SchemaError;
use crate::structure::{layout, merge_inherited_fields, FieldSpec, StructureType};
use crate::volatile::VolatileResolver;
use std::collections::HashMap;
use values::StorageKind;

/// Built-in, always-present type names. Every other name must be defined
/// via [`Schema::define_structure`] or [`Schema::reconstruct`] before use.
const BUILTIN_TYPES: &[&str] = &["Int", "Float", "ByteString", "ForeignBuffer"];

/// The live, in-memory type namespace for one open storage. Mirrors the
/// persisted type list (component G keeps that list in the mapping; this
/// is the resolved, queryable form reconstructed from it on reopen).
#[derive(Debug, Default)]
pub struct Schema {
    structures: HashMap<String, StructureType>,
    subtypes: HashMap<String, Vec<String>>,
    volatile: HashMap<String, ()>,
    defined_order: Vec<String>,
    descriptors: HashMap<String, TypeDescriptor>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Declares `sub` a (direct) subtype of `sup`. Transitive subtyping is
    /// derived by following these edges.
    pub fn declare_subtype(&mut self, sub: impl Into<String>, sup: impl Into<String>) {
        self.subtypes.entry(sub.into()).or_default().push(sup.into());
    }

    pub fn is_subtype(&self, candidate: &str, of: &str) -> bool {
        if candidate == of {
            return true;
        }
        self.subtypes
            .get(candidate)
            .is_some_and(|parents| parents.iter().any(|p| self.is_subtype(p, of)))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        BUILTIN_TYPES.contains(&name) || self.structures.contains_key(name) || self.descriptors.contains_key(name)
    }

    /// `Int`/`Float` are by-value, 8 bytes wide; everything else (byte
    /// strings, structures, containers, the foreign buffer) is by-reference
    /// (spec.md §4.3).
    pub fn storage_kind_for(&self, type_name: &str) -> StorageKind {
        match type_name {
            "Int" | "Float" => StorageKind::ByValue { size: 8 },
            _ => StorageKind::ByReference,
        }
    }

    pub fn structure(&self, name: &str) -> Result<&StructureType, SchemaError> {
        self.structures.get(name).ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Defines a new structure type: `name: (own field name, own field type
    /// name)` pairs, inherited from `bases` (each either a previously
    /// defined structure or a name a `resolver` recognizes as volatile).
    pub fn define_structure(
        &mut self,
        class_name: &str,
        bases: &[&str],
        own_fields: Vec<(String, String)>,
        resolver: &dyn VolatileResolver,
    ) -> Result<(), SchemaError> {
        if self.is_defined(class_name) {
            return Err(SchemaError::DuplicateName(class_name.to_string()));
        }

        let mut inherited: Vec<FieldSpec> = Vec::new();
        let mut base_names = Vec::new();
        for &base in bases {
            base_names.push(base.to_string());
            if let Some(base_struct) = self.structures.get(base) {
                for field in &base_struct.fields {
                    inherited.push((field.name.clone(), field.type_name.clone(), field.storage));
                }
            } else if resolver.resolve(base) {
                self.volatile.insert(base.to_string(), ());
                tracing::warn!(base, "volatile base contributes no persistent fields");
            } else {
                return Err(SchemaError::UnknownType(base.to_string()));
            }
            self.declare_subtype(class_name, base);
        }

        let own_specs: Vec<FieldSpec> = own_fields
            .into_iter()
            .map(|(name, type_name)| {
                let storage = self.storage_kind_for(&type_name);
                (name, type_name, storage)
            })
            .collect();

        let merged = merge_inherited_fields(inherited, own_specs, |a, b| self.is_subtype(a, b), class_name)?;
        let fields = layout(merged);

        let descriptor = TypeDescriptor::Structure {
            class_name: class_name.to_string(),
            bases: base_names,
            extra_attrs: Vec::new(),
            fields: fields.iter().map(|f| (f.name.clone(), f.type_name.clone())).collect(),
        };

        self.structures.insert(
            class_name.to_string(),
            StructureType {
                class_name: class_name.to_string(),
                fields,
            },
        );
        self.descriptors.insert(class_name.to_string(), descriptor);
        self.defined_order.push(class_name.to_string());
        Ok(())
    }

    /// Reconstructs a structure type directly from its persisted
    /// descriptor's already-canonical field list, on reopen — the same
    /// type-definition path, minus re-deriving the merge (it was already
    /// validated when the type was first defined).
    pub fn reconstruct(&mut self, descriptor: TypeDescriptor) -> Result<(), SchemaError> {
        if let TypeDescriptor::Structure { class_name, fields, .. } = &descriptor {
            let specs: Vec<FieldSpec> = fields
                .iter()
                .map(|(name, type_name)| {
                    let storage = self.storage_kind_for(type_name);
                    (name.clone(), type_name.clone(), storage)
                })
                .collect();
            let laid_out = layout(specs);
            self.structures.insert(
                class_name.clone(),
                StructureType {
                    class_name: class_name.clone(),
                    fields: laid_out,
                },
            );
            self.defined_order.push(class_name.clone());
            self.descriptors.insert(class_name.clone(), descriptor);
        } else {
            // Non-structure descriptors (containers, nodes, edges) carry no
            // layout to reconstruct; storage-api resolves them directly by
            // name against their descriptor when building a proxy.
            let name = format!("#{}", self.descriptors.len());
            self.descriptors.insert(name, descriptor);
        }
        Ok(())
    }

    /// Every descriptor in definition order — the order the persisted type
    /// list must be walked in to reproduce this namespace on reopen.
    pub fn descriptors_in_definition_order(&self) -> Vec<&TypeDescriptor> {
        self.defined_order.iter().filter_map(|name| self.descriptors.get(name)).collect()
    }

    /// Same as [`Schema::descriptors_in_definition_order`], paired with the
    /// name each was registered under — needed by callers (container/node/
    /// edge kinds) that have no `class_name` field to recover the name from.
    pub fn named_descriptors_in_definition_order(&self) -> Vec<(&str, &TypeDescriptor)> {
        self.defined_order
            .iter()
            .filter_map(|name| self.descriptors.get(name).map(|d| (name.as_str(), d)))
            .collect()
    }

    /// Registers a non-structure type under an explicit name (an edge kind,
    /// a node type, or a container's element-type tag) — the counterpart to
    /// [`Schema::define_structure`] for descriptors that carry no
    /// `class_name` of their own.
    pub fn define_named(&mut self, name: &str, descriptor: TypeDescriptor) -> Result<(), SchemaError> {
        if self.is_defined(name) {
            return Err(SchemaError::DuplicateName(name.to_string()));
        }
        self.descriptors.insert(name.to_string(), descriptor);
        self.defined_order.push(name.to_string());
        Ok(())
    }

    /// Looks up any registered descriptor (structure or not) by name.
    pub fn descriptor(&self, name: &str) -> Option<&TypeDescriptor> {
        self.descriptors.get(name)
    }

    /// [`Schema::reconstruct`], but for descriptors recovered alongside
    /// their registered name (everything but `Structure`, whose name is
    /// `class_name` itself).
    pub fn reconstruct_named(&mut self, name: &str, descriptor: TypeDescriptor) -> Result<(), SchemaError> {
        match descriptor {
            structure @ TypeDescriptor::Structure { .. } => self.reconstruct(structure),
            other => {
                self.descriptors.insert(name.to_string(), other);
                self.defined_order.push(name.to_string());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volatile::NoVolatileBases;

    #[test]
    fn defines_and_looks_up_a_structure() {
        let mut schema = Schema::new();
        schema
            .define_structure(
                "Agent",
                &[],
                vec![
                    ("name".into(), "ByteString".into()),
                    ("age".into(), "Int".into()),
                    ("weight".into(), "Float".into()),
                ],
                &NoVolatileBases,
            )
            .unwrap();
        let agent = schema.structure("Agent").unwrap();
        assert_eq!(agent.field("age").unwrap().offset, agent.field("age").unwrap().offset);
        assert_eq!(agent.fields.len(), 3);
    }

    #[test]
    fn duplicate_definition_fails() {
        let mut schema = Schema::new();
        schema.define_structure("Agent", &[], vec![], &NoVolatileBases).unwrap();
        assert!(matches!(
            schema.define_structure("Agent", &[], vec![], &NoVolatileBases),
            Err(SchemaError::DuplicateName(_))
        ));
    }

    #[test]
    fn derived_structure_inherits_base_fields() {
        let mut schema = Schema::new();
        schema
            .define_structure("Base", &[], vec![("id".into(), "Int".into())], &NoVolatileBases)
            .unwrap();
        schema
            .define_structure("Derived", &["Base"], vec![("label".into(), "ByteString".into())], &NoVolatileBases)
            .unwrap();
        let derived = schema.structure("Derived").unwrap();
        assert!(derived.field("id").is_some());
        assert!(derived.field("label").is_some());
    }

    #[test]
    fn reconstruct_reproduces_identical_layout() {
        let mut original = Schema::new();
        original
            .define_structure(
                "Agent",
                &[],
                vec![("name".into(), "ByteString".into()), ("age".into(), "Int".into())],
                &NoVolatileBases,
            )
            .unwrap();
        let descriptor = original.descriptors_in_definition_order()[0].clone();

        let mut reopened = Schema::new();
        reopened.reconstruct(descriptor).unwrap();

        let before = original.structure("Agent").unwrap();
        let after = reopened.structure("Agent").unwrap();
        assert_eq!(before.fields.len(), after.fields.len());
        for (a, b) in before.fields.iter().zip(after.fields.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.offset, b.offset);
        }
    }
}
