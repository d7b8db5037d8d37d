mod error;
mod layout;
mod record_page;
mod rid;
mod schema;
mod table_scan;

pub use error::{RecordError, RecordResult};
pub use layout::Layout;
pub use record_page::RecordPage;
pub use rid::Rid;
pub use schema::{FieldType, Schema};
pub use table_scan::TableScan;

/// Slot index within a record page
pub type SlotId = usize;
