mod error;
mod log_iterator;
mod log_manager;

pub use error::{LogError, LogResult};
pub use log_iterator::LogIterator;
pub use log_manager::LogManager;

/// Log sequence number; the first append returns 1
pub type Lsn = usize;
