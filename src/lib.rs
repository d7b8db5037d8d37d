//! Storage and record-management core of an educational relational
//! database engine.
//!
//! Four layers, each depending only on the ones below it:
//!
//! - [`file`] — fixed-size block I/O over named files in a database
//!   directory, with [`Page`] as the in-memory block image.
//! - [`log`] — a backward-growing write-ahead log with monotonic sequence
//!   numbers and iterator-based recovery reads.
//! - [`buffer`] — a fixed pool of page frames with pin/unpin discipline,
//!   dirty tracking, and WAL-compliant flushing.
//! - [`record`] — slotted pages under a table [`Schema`]/[`Layout`], plus
//!   the [`TableScan`] cursor for insert, update, delete, and RID lookup.
//!
//! The [`query`] module holds the [`Scan`]/[`UpdateScan`] contracts the
//! relational operators above this core build on.

pub mod buffer;
pub mod file;
pub mod log;
pub mod query;
pub mod record;

pub use buffer::{Buffer, BufferManager, TxId};
pub use file::{BlockId, FileManager, Page};
pub use log::{LogIterator, LogManager, Lsn};
pub use query::{Constant, Scan, UpdateScan};
pub use record::{Layout, RecordPage, Rid, Schema, TableScan};
