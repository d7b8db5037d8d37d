use thiserror::Error;

use crate::file::FileError;
use crate::log::LogError;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("No buffer available after waiting {waited_ms} ms")]
    Abort { waited_ms: u64 },

    #[error("Unpin on a buffer with no pins")]
    PinUnderflow,

    #[error("Invalid buffer index: {0}")]
    InvalidBuffer(usize),
}

pub type BufferResult<T> = Result<T, BufferError>;
