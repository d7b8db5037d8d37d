use thiserror::Error;

use crate::file::FileError;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("No more log records")]
    NoMoreRecords,

    #[error("Log record of {size} bytes cannot fit in a {block_size}-byte block")]
    RecordTooLarge { size: usize, block_size: usize },
}

pub type LogResult<T> = Result<T, LogError>;
