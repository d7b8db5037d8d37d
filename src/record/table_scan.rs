use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{RecordError, RecordResult};
use super::layout::Layout;
use super::record_page::RecordPage;
use super::rid::Rid;
use super::schema::FieldType;
use super::SlotId;
use crate::buffer::{Buffer, BufferError, BufferManager, TxId};
use crate::file::{BlockId, BlockNum, FileManager};
use crate::query::{Constant, Scan, UpdateScan};

/// Sequential and RID-addressed cursor over the records of one table,
/// stored in `<table_name>.tbl`.
///
/// The scan holds exactly one pin on the table file at any time, released
/// by [`close`](Self::close) or by dropping the scan. A current slot of
/// `None` means "before any record on this block".
pub struct TableScan {
    bm: Arc<Mutex<BufferManager>>,
    fm: Arc<FileManager>,
    layout: Layout,
    filename: String,
    tx: TxId,
    current_blk: BlockId,
    current_slot: Option<SlotId>,
    buffer_idx: Option<usize>,
}

impl TableScan {
    /// Open a scan over `tblname` on behalf of transaction `tx`, creating
    /// and formatting the table's first block if the file is empty
    pub fn new(
        bm: Arc<Mutex<BufferManager>>,
        tx: TxId,
        tblname: &str,
        layout: Layout,
    ) -> RecordResult<Self> {
        let filename = format!("{tblname}.tbl");
        let fm = Arc::clone(bm.lock().unwrap().file_mgr());

        let mut scan = Self {
            bm,
            fm,
            layout,
            current_blk: BlockId::new(&filename, 0),
            filename,
            tx,
            current_slot: None,
            buffer_idx: None,
        };
        if scan.fm.length(&scan.filename)? == 0 {
            scan.move_to_new_block()?;
        } else {
            scan.move_to_block(0)?;
        }
        Ok(scan)
    }

    /// Reset the cursor to before the first record of the table
    pub fn before_first(&mut self) -> RecordResult<()> {
        self.move_to_block(0)
    }

    /// Advance to the next record, moving across blocks as needed.
    ///
    /// Returns false once no used slot remains through the last block.
    pub fn next(&mut self) -> RecordResult<bool> {
        loop {
            self.current_slot = {
                let mut bm = self.bm.lock().unwrap();
                let buffer = self.pinned_buffer(&mut bm)?;
                let rp = RecordPage::new(buffer, &self.layout, self.tx);
                rp.next_after(self.current_slot)?
            };
            if self.current_slot.is_some() {
                return Ok(true);
            }
            if self.at_last_block()? {
                return Ok(false);
            }
            let next_blk = self.current_blk.number() + 1;
            self.move_to_block(next_blk)?;
        }
    }

    pub fn get_int(&mut self, fldname: &str) -> RecordResult<i32> {
        let slot = self.positioned_slot()?;
        let mut bm = self.bm.lock().unwrap();
        let buffer = self.pinned_buffer(&mut bm)?;
        let rp = RecordPage::new(buffer, &self.layout, self.tx);
        rp.get_int(slot, fldname)
    }

    pub fn get_string(&mut self, fldname: &str) -> RecordResult<String> {
        let slot = self.positioned_slot()?;
        let mut bm = self.bm.lock().unwrap();
        let buffer = self.pinned_buffer(&mut bm)?;
        let rp = RecordPage::new(buffer, &self.layout, self.tx);
        rp.get_string(slot, fldname)
    }

    pub fn get_val(&mut self, fldname: &str) -> RecordResult<Constant> {
        match self.layout.schema().field_type(fldname) {
            Some(FieldType::Integer) => Ok(Constant::Int(self.get_int(fldname)?)),
            Some(FieldType::Varchar) => Ok(Constant::String(self.get_string(fldname)?)),
            None => Err(RecordError::UnknownField(fldname.to_string())),
        }
    }

    pub fn has_field(&self, fldname: &str) -> bool {
        self.layout.schema().has_field(fldname)
    }

    /// Release the pin this scan holds
    pub fn close(&mut self) -> RecordResult<()> {
        if let Some(idx) = self.buffer_idx.take() {
            self.bm.lock().unwrap().unpin(idx)?;
        }
        Ok(())
    }

    pub fn set_int(&mut self, fldname: &str, val: i32) -> RecordResult<()> {
        let slot = self.positioned_slot()?;
        let mut bm = self.bm.lock().unwrap();
        let buffer = self.pinned_buffer(&mut bm)?;
        let mut rp = RecordPage::new(buffer, &self.layout, self.tx);
        rp.set_int(slot, fldname, val)
    }

    pub fn set_string(&mut self, fldname: &str, val: &str) -> RecordResult<()> {
        let slot = self.positioned_slot()?;
        let mut bm = self.bm.lock().unwrap();
        let buffer = self.pinned_buffer(&mut bm)?;
        let mut rp = RecordPage::new(buffer, &self.layout, self.tx);
        rp.set_string(slot, fldname, val)
    }

    pub fn set_val(&mut self, fldname: &str, val: &Constant) -> RecordResult<()> {
        match self.layout.schema().field_type(fldname) {
            Some(FieldType::Integer) => {
                let i = val.as_int().ok_or_else(|| RecordError::TypeMismatch {
                    expected: "integer".to_string(),
                    actual: val.to_string(),
                })?;
                self.set_int(fldname, i)
            }
            Some(FieldType::Varchar) => {
                let s = val
                    .as_string()
                    .ok_or_else(|| RecordError::TypeMismatch {
                        expected: "string".to_string(),
                        actual: val.to_string(),
                    })?
                    .to_string();
                self.set_string(fldname, &s)
            }
            None => Err(RecordError::UnknownField(fldname.to_string())),
        }
    }

    /// Position the cursor on a freshly claimed empty slot, appending and
    /// formatting a new block when the tail of the file is full
    pub fn insert(&mut self) -> RecordResult<()> {
        loop {
            let claimed = {
                let mut bm = self.bm.lock().unwrap();
                let buffer = self.pinned_buffer(&mut bm)?;
                let mut rp = RecordPage::new(buffer, &self.layout, self.tx);
                rp.insert_after(self.current_slot)?
            };
            if let Some(slot) = claimed {
                self.current_slot = Some(slot);
                return Ok(());
            }
            if self.at_last_block()? {
                self.move_to_new_block()?;
            } else {
                let next_blk = self.current_blk.number() + 1;
                self.move_to_block(next_blk)?;
            }
        }
    }

    /// Delete the current record by marking its slot empty
    pub fn delete(&mut self) -> RecordResult<()> {
        let slot = self.positioned_slot()?;
        let mut bm = self.bm.lock().unwrap();
        let buffer = self.pinned_buffer(&mut bm)?;
        let mut rp = RecordPage::new(buffer, &self.layout, self.tx);
        rp.delete(slot)
    }

    /// Physical address of the current record, if positioned
    pub fn get_rid(&self) -> Option<Rid> {
        self.current_slot
            .map(|slot| Rid::new(self.current_blk.number(), slot))
    }

    /// Reposition the cursor on a previously captured record address
    pub fn move_to_rid(&mut self, rid: Rid) -> RecordResult<()> {
        self.close()?;
        let blk = BlockId::new(&self.filename, rid.block_number());
        let idx = self.bm.lock().unwrap().pin(&blk)?;
        self.buffer_idx = Some(idx);
        self.current_blk = blk;
        self.current_slot = Some(rid.slot());
        Ok(())
    }

    fn move_to_block(&mut self, blknum: BlockNum) -> RecordResult<()> {
        self.close()?;
        let blk = BlockId::new(&self.filename, blknum);
        let idx = self.bm.lock().unwrap().pin(&blk)?;
        self.buffer_idx = Some(idx);
        self.current_blk = blk;
        self.current_slot = None;
        Ok(())
    }

    fn move_to_new_block(&mut self) -> RecordResult<()> {
        self.close()?;
        let blk = self.fm.append(&self.filename)?;
        let mut bm = self.bm.lock().unwrap();
        let idx = bm.pin(&blk)?;
        self.buffer_idx = Some(idx);
        self.current_blk = blk;
        self.current_slot = None;

        let buffer = self.pinned_buffer(&mut bm)?;
        let mut rp = RecordPage::new(buffer, &self.layout, self.tx);
        rp.format()?;
        Ok(())
    }

    fn at_last_block(&self) -> RecordResult<bool> {
        Ok(self.current_blk.number() == self.fm.length(&self.filename)? - 1)
    }

    fn positioned_slot(&self) -> RecordResult<SlotId> {
        self.current_slot.ok_or(RecordError::NotPositioned)
    }

    fn pinned_buffer<'b>(
        &self,
        bm: &'b mut MutexGuard<'_, BufferManager>,
    ) -> RecordResult<&'b mut Buffer> {
        let idx = self.buffer_idx.ok_or(RecordError::ScanClosed)?;
        bm.buffer_mut(idx)
            .ok_or(RecordError::Buffer(BufferError::InvalidBuffer(idx)))
    }
}

impl Drop for TableScan {
    fn drop(&mut self) {
        if self.buffer_idx.is_some() {
            let _ = self.close();
        }
    }
}

impl Scan for TableScan {
    fn before_first(&mut self) -> RecordResult<()> {
        TableScan::before_first(self)
    }

    fn next(&mut self) -> RecordResult<bool> {
        TableScan::next(self)
    }

    fn get_int(&mut self, fldname: &str) -> RecordResult<i32> {
        TableScan::get_int(self, fldname)
    }

    fn get_string(&mut self, fldname: &str) -> RecordResult<String> {
        TableScan::get_string(self, fldname)
    }

    fn get_val(&mut self, fldname: &str) -> RecordResult<Constant> {
        TableScan::get_val(self, fldname)
    }

    fn has_field(&self, fldname: &str) -> bool {
        TableScan::has_field(self, fldname)
    }

    fn close(&mut self) -> RecordResult<()> {
        TableScan::close(self)
    }
}

impl UpdateScan for TableScan {
    fn set_int(&mut self, fldname: &str, val: i32) -> RecordResult<()> {
        TableScan::set_int(self, fldname, val)
    }

    fn set_string(&mut self, fldname: &str, val: &str) -> RecordResult<()> {
        TableScan::set_string(self, fldname, val)
    }

    fn set_val(&mut self, fldname: &str, val: &Constant) -> RecordResult<()> {
        TableScan::set_val(self, fldname, val)
    }

    fn insert(&mut self) -> RecordResult<()> {
        TableScan::insert(self)
    }

    fn delete(&mut self) -> RecordResult<()> {
        TableScan::delete(self)
    }

    fn get_rid(&self) -> Option<Rid> {
        TableScan::get_rid(self)
    }

    fn move_to_rid(&mut self, rid: Rid) -> RecordResult<()> {
        TableScan::move_to_rid(self, rid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogManager;
    use crate::record::Schema;
    use tempfile::TempDir;

    const BLOCK_SIZE: usize = 400;
    const TX: TxId = 1;

    fn student_layout() -> Layout {
        let mut schema = Schema::new();
        schema.add_int_field("id");
        schema.add_string_field("name", 20);
        schema.add_int_field("age");
        Layout::new(Arc::new(schema))
    }

    fn open_managers(temp_dir: &TempDir, numbuffs: usize) -> Arc<Mutex<BufferManager>> {
        let fm = Arc::new(FileManager::new(temp_dir.path().join("db"), BLOCK_SIZE).unwrap());
        let lm = Arc::new(Mutex::new(
            LogManager::new(Arc::clone(&fm), "minidb.log").unwrap(),
        ));
        Arc::new(Mutex::new(BufferManager::new(fm, lm, numbuffs)))
    }

    fn setup() -> (TempDir, Arc<Mutex<BufferManager>>) {
        let temp_dir = tempfile::tempdir().unwrap();
        let bm = open_managers(&temp_dir, 8);
        (temp_dir, bm)
    }

    fn insert_student(scan: &mut TableScan, id: i32, name: &str, age: i32) {
        scan.insert().unwrap();
        scan.set_int("id", id).unwrap();
        scan.set_string("name", name).unwrap();
        scan.set_int("age", age).unwrap();
    }

    #[test]
    fn test_single_record_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let bm = open_managers(&temp_dir, 8);
            let mut scan =
                TableScan::new(Arc::clone(&bm), TX, "students", student_layout()).unwrap();
            insert_student(&mut scan, 1, "Alice", 25);
            scan.close().unwrap();
            bm.lock().unwrap().flush_all(TX).unwrap();
        }

        // Fresh managers over the same directory
        let bm = open_managers(&temp_dir, 8);
        let mut scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();
        scan.before_first().unwrap();
        assert!(scan.next().unwrap());
        assert_eq!(scan.get_int("id").unwrap(), 1);
        assert_eq!(scan.get_string("name").unwrap(), "Alice");
        assert_eq!(scan.get_int("age").unwrap(), 25);
        assert!(!scan.next().unwrap());
    }

    #[test]
    fn test_scan_spans_blocks_in_insertion_order() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(Arc::clone(&bm), TX, "students", student_layout()).unwrap();

        for id in 1..=30 {
            insert_student(&mut scan, id, &format!("student {}", id), 20 + id % 10);
        }

        // 11 slots per 400-byte block, so 30 records need three blocks
        let fm = Arc::clone(bm.lock().unwrap().file_mgr());
        assert!(fm.length("students.tbl").unwrap() >= 3);

        scan.before_first().unwrap();
        let mut ids = Vec::new();
        while scan.next().unwrap() {
            ids.push(scan.get_int("id").unwrap());
        }
        assert_eq!(ids, (1..=30).collect::<Vec<_>>());
    }

    #[test]
    fn test_delete_in_middle() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();

        for id in 1..=3 {
            insert_student(&mut scan, id, "x", 20);
        }

        scan.before_first().unwrap();
        while scan.next().unwrap() {
            if scan.get_int("id").unwrap() == 2 {
                scan.delete().unwrap();
                break;
            }
        }

        scan.before_first().unwrap();
        let mut ids = Vec::new();
        while scan.next().unwrap() {
            ids.push(scan.get_int("id").unwrap());
        }
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_update_in_place() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();

        insert_student(&mut scan, 1, "Alice", 25);

        scan.before_first().unwrap();
        assert!(scan.next().unwrap());
        scan.set_string("name", "Alicia").unwrap();
        scan.set_int("age", 26).unwrap();

        scan.before_first().unwrap();
        assert!(scan.next().unwrap());
        assert_eq!(scan.get_int("id").unwrap(), 1);
        assert_eq!(scan.get_string("name").unwrap(), "Alicia");
        assert_eq!(scan.get_int("age").unwrap(), 26);
    }

    #[test]
    fn test_move_to_rid_round_trip() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();

        insert_student(&mut scan, 1, "Alice", 25);
        insert_student(&mut scan, 2, "Bob", 30);
        let saved = scan.get_rid().unwrap();
        insert_student(&mut scan, 3, "Carol", 35);
        insert_student(&mut scan, 4, "Dave", 40);

        scan.move_to_rid(saved).unwrap();
        assert_eq!(scan.get_string("name").unwrap(), "Bob");
        assert_eq!(scan.get_int("id").unwrap(), 2);
    }

    #[test]
    fn test_scan_holds_exactly_one_pin() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(Arc::clone(&bm), TX, "students", student_layout()).unwrap();

        for id in 1..=30 {
            insert_student(&mut scan, id, "x", 20);
        }
        assert_eq!(bm.lock().unwrap().available(), 7);

        // Walking across blocks does not accumulate pins
        scan.before_first().unwrap();
        while scan.next().unwrap() {}
        assert_eq!(bm.lock().unwrap().available(), 7);

        scan.close().unwrap();
        assert_eq!(bm.lock().unwrap().available(), 8);
    }

    #[test]
    fn test_drop_releases_pin() {
        let (_temp_dir, bm) = setup();
        {
            let _scan = TableScan::new(Arc::clone(&bm), TX, "students", student_layout()).unwrap();
            assert_eq!(bm.lock().unwrap().available(), 7);
        }
        assert_eq!(bm.lock().unwrap().available(), 8);
    }

    #[test]
    fn test_field_access_before_next_is_error() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();

        assert!(matches!(
            scan.get_int("id"),
            Err(RecordError::NotPositioned)
        ));
        assert!(matches!(
            scan.set_int("id", 1),
            Err(RecordError::NotPositioned)
        ));
    }

    #[test]
    fn test_get_val_and_set_val() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();

        scan.insert().unwrap();
        scan.set_val("id", &Constant::Int(9)).unwrap();
        scan.set_val("name", &Constant::from("Eve")).unwrap();
        scan.set_val("age", &Constant::Int(31)).unwrap();

        assert_eq!(scan.get_val("id").unwrap(), Constant::Int(9));
        assert_eq!(scan.get_val("name").unwrap(), Constant::from("Eve"));

        assert!(matches!(
            scan.set_val("id", &Constant::from("oops")),
            Err(RecordError::TypeMismatch { .. })
        ));
        assert!(matches!(
            scan.get_val("gpa"),
            Err(RecordError::UnknownField(_))
        ));
    }

    #[test]
    fn test_has_field() {
        let (_temp_dir, bm) = setup();
        let scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();

        assert!(scan.has_field("id"));
        assert!(scan.has_field("name"));
        assert!(!scan.has_field("gpa"));
    }

    #[test]
    fn test_deleted_slot_reused_by_insert() {
        let (_temp_dir, bm) = setup();
        let mut scan = TableScan::new(bm, TX, "students", student_layout()).unwrap();

        for id in 1..=3 {
            insert_student(&mut scan, id, "x", 20);
        }

        scan.before_first().unwrap();
        assert!(scan.next().unwrap());
        let freed = scan.get_rid().unwrap();
        scan.delete().unwrap();

        scan.before_first().unwrap();
        scan.insert().unwrap();
        assert_eq!(scan.get_rid().unwrap(), freed);
    }

    #[test]
    fn test_usable_through_dyn_update_scan() {
        let (_temp_dir, bm) = setup();
        let mut scan: Box<dyn UpdateScan> =
            Box::new(TableScan::new(bm, TX, "students", student_layout()).unwrap());

        scan.insert().unwrap();
        scan.set_int("id", 5).unwrap();
        scan.set_string("name", "Frank").unwrap();
        scan.set_int("age", 50).unwrap();

        scan.before_first().unwrap();
        assert!(scan.next().unwrap());
        assert_eq!(scan.get_val("name").unwrap(), Constant::from("Frank"));
        scan.close().unwrap();
    }
}
