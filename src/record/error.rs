use thiserror::Error;

use crate::buffer::BufferError;
use crate::file::FileError;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Scan is not positioned at a record")]
    NotPositioned,

    #[error("Scan is closed")]
    ScanClosed,

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

pub type RecordResult<T> = Result<T, RecordError>;
