use thiserror::Error;

/// Errors raised by the mapping layer (component A). These are the leaves
/// of the public `StorageError` taxonomy in spec.md §7 (`IoError`, `Full`,
/// `Closed`, `Corruption`) that originate below the value/container layer.
#[derive(Debug, Error)]
pub enum MappingError {
    /// A syscall (`open`, `mmap`, `munmap`, `msync`, `ftruncate`) failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `free_offset + n` would exceed the mapped file's real size.
    #[error("allocator exhausted: requested {requested} bytes, only {available} available")]
    Full { requested: u64, available: u64 },

    /// An operation was attempted after `close()`.
    #[error("operation attempted on a closed mapping")]
    Closed,

    /// The mapping was already closed; a second `close()` call is an error.
    #[error("mapping is already closed")]
    AlreadyClosed,

    /// On open: the file exists but its magic doesn't match this engine's version.
    #[error("bad magic in file header: {0:?}")]
    BadMagic(String),

    /// On open: neither header slot carries a clean status.
    #[error("no clean header slot found; file is corrupted or was never committed")]
    NoCleanHeader,

    /// Attempted to shrink-then-grow an existing file upward beyond its current size.
    #[error("cannot resize an existing file from {current} up to {requested}")]
    ResizeForbidden { current: u64, requested: u64 },

    /// `requested_size` was `0` on a fresh create, or similar nonsensical parameter.
    #[error("invalid open parameter: {0}")]
    InvalidParameter(String),

    /// A header field failed to decode.
    #[error("header codec error")]
    Binary(#[from] binary_helpers::bin_error::BinaryError),
}
