use thiserror::Error;

/// Errors raised by the redo log (component B).
#[derive(Debug, Error)]
pub enum RedoError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The next record would cross the redo mapping's end. Spec.md §7:
    /// surfaced to the caller as `Full` for the primary write.
    #[error("redo log exhausted: requested {requested} bytes, only {available} available")]
    RedoFull { requested: u64, available: u64 },

    #[error("bad magic in redo log header: {0:?}")]
    BadMagic(String),

    #[error("operation attempted on a closed redo log")]
    Closed,

    #[error("redo log codec error")]
    Binary(#[from] binary_helpers::bin_error::BinaryError),
}
