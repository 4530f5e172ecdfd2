use thiserror::Error;

/// Errors produced by the container layer (component D): hash table,
/// linked list, skip list, default dictionary.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container is at capacity")]
    Full,

    #[error("key not found")]
    KeyNotFound,

    #[error("value of the wrong type for this operation")]
    Type,

    #[error(transparent)]
    Mapping(#[from] mapping::MappingError),

    #[error(transparent)]
    Value(#[from] values::ValueError),
}
