mod buffer_manager;
mod error;
mod frame;

pub use buffer_manager::BufferManager;
pub use error::{BufferError, BufferResult};
pub use frame::Buffer;

/// Transaction identifier threaded through page modifications
pub type TxId = usize;
