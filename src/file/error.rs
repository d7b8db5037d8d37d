use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("IO error on block {block} of {file}: {source}")]
    BlockIo {
        file: String,
        block: usize,
        source: io::Error,
    },

    #[error("Page access out of bounds: offset={offset}, len={len}, page_size={page_size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        page_size: usize,
    },

    #[error("Invalid page data: {0}")]
    InvalidFormat(String),
}

pub type FileResult<T> = Result<T, FileError>;
