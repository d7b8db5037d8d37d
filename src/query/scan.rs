use super::Constant;
use crate::record::{RecordResult, Rid};

/// Read contract shared by every scan kind.
///
/// Table scans implement it directly; relational operators (select,
/// project, product, sort) wrap other scans behind the same surface, so
/// composition sites dispatch through `dyn Scan` without caring which
/// variant they drive.
pub trait Scan {
    /// Position the scan before its first record; the next call to
    /// [`next`](Self::next) moves to the first record
    fn before_first(&mut self) -> RecordResult<()>;

    /// Move to the next record, returning false when there is none
    fn next(&mut self) -> RecordResult<bool>;

    /// Integer value of the named field in the current record
    fn get_int(&mut self, fldname: &str) -> RecordResult<i32>;

    /// String value of the named field in the current record
    fn get_string(&mut self, fldname: &str) -> RecordResult<String>;

    /// Value of the named field in the current record
    fn get_val(&mut self, fldname: &str) -> RecordResult<Constant>;

    /// Whether the scan produces the named field
    fn has_field(&self, fldname: &str) -> bool;

    /// Close the scan, releasing the resources it holds
    fn close(&mut self) -> RecordResult<()>;
}

/// Mutation contract implemented by scans positioned over real storage
pub trait UpdateScan: Scan {
    fn set_int(&mut self, fldname: &str, val: i32) -> RecordResult<()>;

    fn set_string(&mut self, fldname: &str, val: &str) -> RecordResult<()>;

    fn set_val(&mut self, fldname: &str, val: &Constant) -> RecordResult<()>;

    /// Move to a freshly claimed slot the caller can populate
    fn insert(&mut self) -> RecordResult<()>;

    /// Delete the current record
    fn delete(&mut self) -> RecordResult<()>;

    /// Physical address of the current record, if positioned
    fn get_rid(&self) -> Option<Rid>;

    /// Reposition the scan at a previously captured address
    fn move_to_rid(&mut self, rid: Rid) -> RecordResult<()>;
}
