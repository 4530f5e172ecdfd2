use thiserror::Error;

/// Errors produced by the value layer (component C): scalar, byte-string,
/// field, and foreign-buffer codecs.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("expected {expected} bytes for this slot, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("operation is not defined for this field's storage kind")]
    WrongStorageKind,

    #[error("value of the wrong type used here")]
    Type,

    #[error("non-C-contiguous buffer requested")]
    NonContiguous,

    #[error("buffer codec error")]
    Binary(#[from] binary_helpers::bin_error::BinaryError),
}
