use thiserror::Error;

/// Errors produced by the schema registry (component E).
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("a type named '{0}' is already defined in this storage")]
    DuplicateName(String),

    #[error("no type named '{0}' is defined in this storage")]
    UnknownType(String),

    #[error("field redefinition of '{field}' on '{class_name}' is incompatible with the base type")]
    IncompatibleRedefinition { class_name: String, field: String },

    #[error("type descriptor is malformed: {0}")]
    MalformedDescriptor(String),

    #[error(transparent)]
    Mapping(#[from] mapping::MappingError),

    #[error(transparent)]
    Container(#[from] containers::ContainerError),

    #[error(transparent)]
    Value(#[from] values::ValueError),

    #[error(transparent)]
    Binary(#[from] binary_helpers::bin_error::BinaryError),
}
