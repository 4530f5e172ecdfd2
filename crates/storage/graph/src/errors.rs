use thiserror::Error;

/// Errors produced by the property graph (component F).
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("edge endpoint does not match the declared node type")]
    Type,

    #[error(transparent)]
    Mapping(#[from] mapping::MappingError),

    #[error(transparent)]
    Container(#[from] containers::ContainerError),

    #[error(transparent)]
    Value(#[from] values::ValueError),
}
