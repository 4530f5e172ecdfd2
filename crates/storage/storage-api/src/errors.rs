use thiserror::Error;

/// The full public error taxonomy (spec.md §7). Every lower-layer error
/// folds into one of these kinds; the layer boundary itself never leaks.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A syscall failed. Fatal to the operation; storage is unchanged.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The primary file is out of allocator space.
    #[error("storage is full: {0}")]
    Full(String),

    /// The redo log cannot hold the next transaction; surfaced as `Full`
    /// to the caller per spec.md §7.
    #[error("redo log is full: {0}")]
    RedoFull(String),

    /// An operation was attempted after `close()`.
    #[error("storage is closed")]
    Closed,

    /// `close()` was attempted with non-root proxies still live.
    #[error("{0} proxies are still outstanding; close refused")]
    Proxies(u32),

    /// Wrong-typed value used where a specific type was required.
    #[error("type error: {0}")]
    Type(String),

    /// Lookup of an absent key outside default-dictionary semantics.
    #[error("key not found")]
    KeyNotFound,

    /// Bad parameters to a type descriptor, or a non-contiguous buffer request.
    #[error("value error: {0}")]
    Value(String),

    /// On open: bad magic, no clean header, or a descriptor failed to decode.
    #[error("storage file is corrupt: {0}")]
    Corruption(String),
}

impl From<mapping::MappingError> for StorageError {
    fn from(err: mapping::MappingError) -> Self {
        match err {
            mapping::MappingError::Full { .. } => StorageError::Full(err.to_string()),
            mapping::MappingError::Closed | mapping::MappingError::AlreadyClosed => StorageError::Closed,
            mapping::MappingError::BadMagic(_) | mapping::MappingError::NoCleanHeader => StorageError::Corruption(err.to_string()),
            mapping::MappingError::Io { .. } => StorageError::IoError(err.to_string()),
            other => StorageError::Corruption(other.to_string()),
        }
    }
}

impl From<redo_log::RedoError> for StorageError {
    fn from(err: redo_log::RedoError) -> Self {
        match err {
            redo_log::RedoError::RedoFull { .. } => StorageError::RedoFull(err.to_string()),
            redo_log::RedoError::Closed => StorageError::Closed,
            redo_log::RedoError::Io { .. } => StorageError::IoError(err.to_string()),
            other => StorageError::Corruption(other.to_string()),
        }
    }
}

impl From<containers::ContainerError> for StorageError {
    fn from(err: containers::ContainerError) -> Self {
        match err {
            containers::ContainerError::Full => StorageError::Full(err.to_string()),
            containers::ContainerError::KeyNotFound => StorageError::KeyNotFound,
            containers::ContainerError::Type => StorageError::Type(err.to_string()),
            containers::ContainerError::Mapping(m) => m.into(),
            containers::ContainerError::Value(v) => v.into(),
        }
    }
}

impl From<values::ValueError> for StorageError {
    fn from(err: values::ValueError) -> Self {
        StorageError::Value(err.to_string())
    }
}

impl From<schema::SchemaError> for StorageError {
    fn from(err: schema::SchemaError) -> Self {
        match err {
            schema::SchemaError::DuplicateName(_) | schema::SchemaError::UnknownType(_) | schema::SchemaError::IncompatibleRedefinition { .. } => {
                StorageError::Type(err.to_string())
            }
            schema::SchemaError::MalformedDescriptor(_) => StorageError::Corruption(err.to_string()),
            schema::SchemaError::Mapping(m) => m.into(),
            schema::SchemaError::Container(c) => c.into(),
            schema::SchemaError::Value(v) => StorageError::Value(v.to_string()),
            schema::SchemaError::Binary(b) => StorageError::Corruption(b.to_string()),
        }
    }
}

impl From<graph::GraphError> for StorageError {
    fn from(err: graph::GraphError) -> Self {
        match err {
            graph::GraphError::Type => StorageError::Type(err.to_string()),
            graph::GraphError::Mapping(m) => m.into(),
            graph::GraphError::Container(c) => c.into(),
            graph::GraphError::Value(v) => StorageError::Value(v.to_string()),
        }
    }
}
